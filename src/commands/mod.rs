//! Command model: the executable units a playlist is made of.
//!
//! Commands are immutable value objects constructed by the binder
//! ([`registry`]); the player never mutates a command after binding. Each
//! command carries the [`PlaybackSpot`] it originated from, used for
//! rollback indexing, rewind targeting, and error attribution.

pub mod params;
pub mod registry;

pub use params::{ExpressionEvaluator, ParamValue};

use serde::{Deserialize, Serialize};

/// The exact origin of one executable unit:
/// `(script name, line index, inline index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaybackSpot {
    pub script: String,
    pub line_index: usize,
    pub inline_index: usize,
}

impl PlaybackSpot {
    pub fn new(script: impl Into<String>, line_index: usize, inline_index: usize) -> Self {
        Self {
            script: script.into(),
            line_index,
            inline_index,
        }
    }
}

impl std::fmt::Display for PlaybackSpot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}.{}", self.script, self.line_index, self.inline_index)
    }
}

/// A bound, executable command stamped with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub spot: PlaybackSpot,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(spot: PlaybackSpot, kind: CommandKind) -> Self {
        Self { spot, kind }
    }

    /// Whether this command can pre-fetch resources before execution.
    pub fn preloadable(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::PlayMusic { .. }
                | CommandKind::PlaySound { .. }
                | CommandKind::ShowBackground { .. }
                | CommandKind::ShowCharacter { .. }
                | CommandKind::PlayMovie { .. }
        )
    }

    /// Whether this command must always be awaited fully, even in skip mode.
    pub fn force_wait(&self) -> bool {
        matches!(self.kind, CommandKind::PlayMovie { .. })
    }

    /// Whether executing this command blocks on reader input.
    pub fn is_blocking_wait(&self) -> bool {
        match &self.kind {
            CommandKind::WaitInput => true,
            CommandKind::Wait { mode } => !matches!(mode, WaitMode::Timer(_)),
            _ => false,
        }
    }

    /// Statically known resource paths this command will load. Dynamic
    /// paths resolve only at execution time and cannot be preloaded.
    pub fn resource_paths(&self) -> Vec<String> {
        match &self.kind {
            CommandKind::PlayMusic { path, .. } | CommandKind::PlaySound { path, .. } => path
                .as_static()
                .map(|p| vec![format!("Audio/{p}")])
                .unwrap_or_default(),
            CommandKind::PlayMovie { path } => path
                .as_static()
                .map(|p| vec![format!("Movies/{p}")])
                .unwrap_or_default(),
            CommandKind::ShowBackground { id, appearance } => {
                vec![actor_path("Backgrounds", id, appearance.as_deref())]
            }
            CommandKind::ShowCharacter { id, appearance } => {
                vec![actor_path("Characters", id, appearance.as_deref())]
            }
            _ => Vec::new(),
        }
    }
}

fn actor_path(root: &str, id: &str, appearance: Option<&str>) -> String {
    match appearance {
        Some(app) => format!("{root}/{id}/{app}"),
        None => format!("{root}/{id}"),
    }
}

/// Closed set of executable command bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Reveal text on the printer. Synthesized from generic text lines and
    /// available directly as `@print`.
    Print {
        text: ParamValue,
        author: Option<String>,
        appearance: Option<String>,
        /// First print of a line resets prior printer content; subsequent
        /// prints of the same line append.
        reset_printer: bool,
    },
    /// Synthetic appearance change emitted ahead of an authored line.
    SetAppearance { author: String, appearance: String },
    /// Block until the reader signals continue.
    WaitInput,
    /// `@wait`: input, timer, or whichever comes first.
    Wait { mode: WaitMode },
    /// Navigate to `script.label`, `script`, or `.label`.
    Goto { path: ParamValue, reset: ResetPolicy },
    /// As goto, but pushes the resumption point first.
    Gosub { path: ParamValue },
    /// Pop the return-address stack and resume there.
    Return,
    /// End playback.
    Stop,
    /// `@set name=value`, delegated to the expression evaluator.
    Assign { expression: ParamValue },
    PlayMusic {
        path: ParamValue,
        volume: f32,
        looped: bool,
    },
    PlaySound { path: ParamValue, volume: f32 },
    ShowBackground {
        id: String,
        appearance: Option<String>,
    },
    ShowCharacter {
        id: String,
        appearance: Option<String>,
    },
    HideActor { id: String },
    PlayMovie { path: ParamValue },
}

/// How a `@wait` suspends.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitMode {
    /// `i` — wait for reader input.
    Input,
    /// `<secs>` — wait for the duration.
    Timer(f32),
    /// `i<secs>` — input, or the duration, whichever comes first.
    InputOrTimer(f32),
    /// Expression-valued duration, parsed at execution time.
    Dynamic(ParamValue),
}

impl WaitMode {
    /// Parse the literal `@wait` argument form.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw == "i" {
            return Ok(Self::Input);
        }
        if let Some(secs) = raw.strip_prefix('i') {
            let secs: f32 = secs
                .parse()
                .map_err(|_| format!("invalid wait duration '{secs}'"))?;
            return Ok(Self::InputOrTimer(secs));
        }
        let secs: f32 = raw
            .parse()
            .map_err(|_| format!("invalid wait duration '{raw}'"))?;
        Ok(Self::Timer(secs))
    }
}

/// Parsed goto/gosub target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationPath {
    /// Target script; `None` means the currently playing script.
    pub script: Option<String>,
    /// Target label; `None` means the start of the script.
    pub label: Option<String>,
}

impl NavigationPath {
    /// Parse `Script.label`, `Script`, or `.label`. Returns `None` for an
    /// empty or meaningless path.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once('.') {
            Some(("", label)) if !label.is_empty() => Some(Self {
                script: None,
                label: Some(label.to_string()),
            }),
            Some((script, label)) if !script.is_empty() && !label.is_empty() => Some(Self {
                script: Some(script.to_string()),
                label: Some(label.to_string()),
            }),
            Some(_) => None,
            None => Some(Self {
                script: Some(raw.to_string()),
                label: None,
            }),
        }
    }
}

/// Which engine services a cross-script goto resets.
///
/// Services may declare themselves exempt (`reset_on_goto() == false`);
/// `All` honors that declaration, `Exclude` additionally spares the named
/// services, `None` resets nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    #[default]
    All,
    None,
    Exclude(Vec<String>),
}

impl ResetPolicy {
    /// Build from the `reset` parameter of goto: absent list → `All`,
    /// `-` → `None`, names → `Exclude`.
    pub fn from_list(list: Option<Vec<String>>) -> Self {
        match list {
            None => Self::All,
            Some(items) if items.len() == 1 && items[0] == "-" => Self::None,
            Some(items) => Self::Exclude(items),
        }
    }

    pub fn should_reset(&self, service: &str, opted_out: bool) -> bool {
        if opted_out {
            return false;
        }
        match self {
            Self::All => true,
            Self::None => false,
            Self::Exclude(names) => !names.iter().any(|n| n == service),
        }
    }
}
