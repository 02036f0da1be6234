//! Command registry and binder.
//!
//! Replaces the source system's reflection-driven parameter discovery with
//! an explicit, statically-built registry: each command identifier maps to
//! a field-descriptor table and a builder function that constructs the
//! fully-populated [`CommandKind`] in one step. Any command type can be
//! registered at runtime; the built-in set covers the stock script
//! vocabulary.

use super::params::ParamValue;
use super::{Command, CommandKind, NavigationPath, PlaybackSpot, ResetPolicy, WaitMode};
use crate::error::{BindError, Diagnostics};
use crate::parsing::CommandLineModel;
use std::collections::HashMap;

/// Declared type of a command parameter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Comma-separated list of strings.
    StringList,
    Boolean,
    Decimal,
    /// `name.value` compound, e.g. an actor id with an appearance.
    NamedString,
}

/// Descriptor for one declared parameter field of a command type.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    /// Whether the field matches the single nameless (positional)
    /// parameter of an invocation.
    pub nameless: bool,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            alias: None,
            nameless: false,
            required: false,
            kind,
        }
    }

    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub const fn nameless(mut self) -> Self {
        self.nameless = true;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Builder signature: constructs the command body from bound fields.
pub type BuildFn = fn(&BoundParams) -> Result<CommandKind, BindError>;

/// One registered command type.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub id: &'static str,
    pub aliases: &'static [&'static str],
    pub fields: &'static [FieldSpec],
    pub build: BuildFn,
}

/// Field values matched during binding, with typed accessors used by
/// builder functions. Static values are validated here at bind time;
/// dynamic values pass through for execution-time resolution.
pub struct BoundParams {
    command: &'static str,
    line: usize,
    values: Vec<(&'static str, ParamValue)>,
}

impl BoundParams {
    pub fn value(&self, field: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, v)| v)
    }

    pub fn required(&self, field: &'static str) -> Result<ParamValue, BindError> {
        self.value(field)
            .cloned()
            .ok_or_else(|| BindError::MissingParameter {
                command: self.command.to_string(),
                param: field.to_string(),
                line: self.line,
            })
    }

    pub fn invalid(&self, field: &str, value: &str, reason: impl Into<String>) -> BindError {
        BindError::InvalidParameterValue {
            command: self.command.to_string(),
            param: field.to_string(),
            value: value.to_string(),
            line: self.line,
            reason: reason.into(),
        }
    }

    /// Static-only string field; dynamic values are rejected at bind time.
    pub fn static_string(&self, field: &str) -> Result<Option<String>, BindError> {
        match self.value(field) {
            None => Ok(None),
            Some(v) => match v.as_static() {
                Some(s) => Ok(Some(s.to_string())),
                None => Err(self.invalid(field, "{…}", "value must not contain expressions")),
            },
        }
    }

    pub fn boolean(&self, field: &str) -> Result<Option<bool>, BindError> {
        match self.static_string(field)? {
            None => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(field, &s, "expected 'true' or 'false'")),
        }
    }

    pub fn decimal(&self, field: &str) -> Result<Option<f32>, BindError> {
        match self.static_string(field)? {
            None => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(field, &s, "expected a decimal number")),
        }
    }

    pub fn list(&self, field: &str) -> Result<Option<Vec<String>>, BindError> {
        match self.static_string(field)? {
            None => Ok(None),
            Some(s) => Ok(Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    /// `name.value` compound; the value half is optional.
    pub fn named(&self, field: &'static str) -> Result<(String, Option<String>), BindError> {
        let raw = match self.static_string(field)? {
            Some(s) => s,
            None => {
                return Err(BindError::MissingParameter {
                    command: self.command.to_string(),
                    param: field.to_string(),
                    line: self.line,
                });
            }
        };
        match raw.split_once('.') {
            Some((id, value)) if !id.is_empty() && !value.is_empty() => {
                Ok((id.to_string(), Some(value.to_string())))
            }
            Some(_) => Err(self.invalid(field, &raw, "expected 'id' or 'id.value'")),
            None => Ok((raw, None)),
        }
    }
}

/// Registry of command types, resolved case-insensitively by identifier or
/// alias. Built once at engine construction and injected where needed.
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn empty() -> Self {
        Self {
            specs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in script vocabulary.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for spec in BUILTIN_COMMANDS {
            registry.register(*spec);
        }
        registry
    }

    /// Register a command type. Later registrations shadow earlier ones
    /// with the same identifier or alias.
    pub fn register(&mut self, spec: CommandSpec) {
        let idx = self.specs.len();
        self.specs.push(spec);
        self.index.insert(spec.id.to_ascii_lowercase(), idx);
        for alias in spec.aliases {
            self.index.insert(alias.to_ascii_lowercase(), idx);
        }
    }

    pub fn resolve(&self, id: &str) -> Option<&CommandSpec> {
        self.index
            .get(&id.to_ascii_lowercase())
            .map(|&idx| &self.specs[idx])
    }

    /// Bind a parsed command invocation into an executable [`Command`].
    ///
    /// All problems are accumulated into `sink`; a command whose type
    /// cannot be resolved or instantiated returns `None` and is dropped by
    /// the caller (no placeholder no-op is produced). Unsupported
    /// parameters are reported but do not block binding of declared
    /// fields.
    pub fn bind(
        &self,
        model: &CommandLineModel,
        script: &str,
        line_index: usize,
        inline_index: usize,
        sink: &mut Diagnostics,
    ) -> Option<Command> {
        let spec = match self.resolve(&model.id) {
            Some(spec) => spec,
            None => {
                sink.bind(BindError::CommandNotFound {
                    id: model.id.clone(),
                    line: line_index,
                });
                return None;
            }
        };

        let spot = PlaybackSpot::new(script, line_index, inline_index);
        let mut bound = BoundParams {
            command: spec.id,
            line: line_index,
            values: Vec::new(),
        };
        let mut matched = vec![false; model.params.len()];
        let mut missing_required = false;

        for field in spec.fields {
            let position = model.params.iter().position(|p| match p.id.as_deref() {
                Some(pid) => pid == field.name || Some(pid) == field.alias,
                None => false,
            });
            let position = position.or_else(|| {
                field
                    .nameless
                    .then(|| model.params.iter().position(|p| p.nameless))
                    .flatten()
            });

            match position {
                Some(idx) if !matched[idx] => {
                    matched[idx] = true;
                    bound
                        .values
                        .push((field.name, ParamValue::from_mixed(&model.params[idx].value, &spot)));
                }
                _ => {
                    if field.required {
                        sink.bind(BindError::MissingParameter {
                            command: spec.id.to_string(),
                            param: field.name.to_string(),
                            line: line_index,
                        });
                        missing_required = true;
                    }
                }
            }
        }

        // Guard against silent typos: every leftover model parameter is an
        // error, reported without blocking the declared fields.
        for (idx, param) in model.params.iter().enumerate() {
            if !matched[idx] {
                sink.bind(BindError::UnsupportedParameter {
                    command: spec.id.to_string(),
                    param: param.display_name().to_string(),
                    line: line_index,
                });
            }
        }

        if missing_required {
            return None;
        }

        match (spec.build)(&bound) {
            Ok(kind) => Some(Command::new(spot, kind)),
            Err(error) => {
                sink.bind(error);
                None
            }
        }
    }
}

const BUILTIN_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        id: "print",
        aliases: &[],
        fields: &[
            FieldSpec::new("text", FieldKind::String).nameless().required(),
            FieldSpec::new("author", FieldKind::String),
            FieldSpec::new("appearance", FieldKind::String),
            FieldSpec::new("reset", FieldKind::Boolean),
        ],
        build: build_print,
    },
    CommandSpec {
        id: "wait",
        aliases: &[],
        fields: &[FieldSpec::new("mode", FieldKind::String).nameless().required()],
        build: build_wait,
    },
    CommandSpec {
        id: "waitInput",
        aliases: &["i"],
        fields: &[],
        build: |_| Ok(CommandKind::WaitInput),
    },
    CommandSpec {
        id: "goto",
        aliases: &[],
        fields: &[
            FieldSpec::new("path", FieldKind::String).nameless().required(),
            FieldSpec::new("reset", FieldKind::StringList),
        ],
        build: build_goto,
    },
    CommandSpec {
        id: "gosub",
        aliases: &[],
        fields: &[FieldSpec::new("path", FieldKind::String).nameless().required()],
        build: build_gosub,
    },
    CommandSpec {
        id: "return",
        aliases: &[],
        fields: &[],
        build: |_| Ok(CommandKind::Return),
    },
    CommandSpec {
        id: "stop",
        aliases: &[],
        fields: &[],
        build: |_| Ok(CommandKind::Stop),
    },
    CommandSpec {
        id: "set",
        aliases: &[],
        fields: &[FieldSpec::new("expression", FieldKind::String).nameless().required()],
        build: |p| {
            Ok(CommandKind::Assign {
                expression: p.required("expression")?,
            })
        },
    },
    CommandSpec {
        id: "bgm",
        aliases: &["music"],
        fields: &[
            FieldSpec::new("path", FieldKind::String).nameless().required(),
            FieldSpec::new("volume", FieldKind::Decimal),
            FieldSpec::new("loop", FieldKind::Boolean),
        ],
        build: build_bgm,
    },
    CommandSpec {
        id: "sfx",
        aliases: &["sound"],
        fields: &[
            FieldSpec::new("path", FieldKind::String).nameless().required(),
            FieldSpec::new("volume", FieldKind::Decimal),
        ],
        build: build_sfx,
    },
    CommandSpec {
        id: "back",
        aliases: &["background"],
        fields: &[FieldSpec::new("id", FieldKind::NamedString).nameless().required()],
        build: |p| {
            let (id, appearance) = p.named("id")?;
            Ok(CommandKind::ShowBackground { id, appearance })
        },
    },
    CommandSpec {
        id: "char",
        aliases: &["character"],
        fields: &[FieldSpec::new("id", FieldKind::NamedString).nameless().required()],
        build: |p| {
            let (id, appearance) = p.named("id")?;
            Ok(CommandKind::ShowCharacter { id, appearance })
        },
    },
    CommandSpec {
        id: "hide",
        aliases: &[],
        fields: &[FieldSpec::new("id", FieldKind::String).nameless().required()],
        build: |p| {
            let id = p
                .static_string("id")?
                .ok_or_else(|| p.invalid("id", "", "actor id is required"))?;
            Ok(CommandKind::HideActor { id })
        },
    },
    CommandSpec {
        id: "movie",
        aliases: &["video"],
        fields: &[FieldSpec::new("path", FieldKind::String).nameless().required()],
        build: |p| {
            Ok(CommandKind::PlayMovie {
                path: p.required("path")?,
            })
        },
    },
];

fn build_print(p: &BoundParams) -> Result<CommandKind, BindError> {
    Ok(CommandKind::Print {
        text: p.required("text")?,
        author: p.static_string("author")?,
        appearance: p.static_string("appearance")?,
        reset_printer: p.boolean("reset")?.unwrap_or(false),
    })
}

fn build_wait(p: &BoundParams) -> Result<CommandKind, BindError> {
    let value = p.required("mode")?;
    let mode = match value.as_static() {
        Some(raw) => WaitMode::parse(raw).map_err(|reason| p.invalid("mode", raw, reason))?,
        None => WaitMode::Dynamic(value),
    };
    Ok(CommandKind::Wait { mode })
}

fn build_goto(p: &BoundParams) -> Result<CommandKind, BindError> {
    let path = p.required("path")?;
    validate_static_path(p, &path)?;
    let reset = ResetPolicy::from_list(p.list("reset")?);
    Ok(CommandKind::Goto { path, reset })
}

fn build_gosub(p: &BoundParams) -> Result<CommandKind, BindError> {
    let path = p.required("path")?;
    validate_static_path(p, &path)?;
    Ok(CommandKind::Gosub { path })
}

fn validate_static_path(p: &BoundParams, path: &ParamValue) -> Result<(), BindError> {
    if let Some(raw) = path.as_static()
        && NavigationPath::parse(raw).is_none()
    {
        return Err(p.invalid("path", raw, "expected 'Script', 'Script.label', or '.label'"));
    }
    Ok(())
}

fn build_bgm(p: &BoundParams) -> Result<CommandKind, BindError> {
    Ok(CommandKind::PlayMusic {
        path: p.required("path")?,
        volume: p.decimal("volume")?.unwrap_or(1.0),
        looped: p.boolean("loop")?.unwrap_or(true),
    })
}

fn build_sfx(p: &BoundParams) -> Result<CommandKind, BindError> {
    Ok(CommandKind::PlaySound {
        path: p.required("path")?,
        volume: p.decimal("volume")?.unwrap_or(1.0),
    })
}
