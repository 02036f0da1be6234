//! Playlist: the flattened, strictly ordered sequence of executable
//! commands derived from a script.
//!
//! Command lines contribute their one bound command; generic text lines
//! are expanded into synthetic appearance/print/wait commands; labels,
//! comments, and empty lines contribute nothing executable but remain
//! addressable through the retained line index. Deriving a playlist from
//! an unchanged script is deterministic and idempotent.

use crate::commands::registry::CommandRegistry;
use crate::commands::{Command, CommandKind, ParamValue, PlaybackSpot};
use crate::error::Diagnostics;
use crate::parsing::{GenericContent, GenericTextModel};
use crate::script::{LineContent, Script};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    script_name: String,
    commands: Vec<Command>,
    /// Label → line index, copied from the source script so in-playlist
    /// navigation needs no script lookup.
    labels: BTreeMap<String, usize>,
    line_count: usize,
}

impl Playlist {
    /// Derive the playlist for `script`, binding commands through
    /// `registry`. Bind failures drop the offending command and are
    /// accumulated into `sink`; everything else still builds.
    pub fn build(script: &Script, registry: &CommandRegistry, sink: &mut Diagnostics) -> Self {
        let mut commands = Vec::new();

        for line in script.lines() {
            match &line.content {
                LineContent::Command { model } => {
                    if let Some(cmd) = registry.bind(model, script.name(), line.index, 0, sink) {
                        commands.push(cmd);
                    }
                }
                LineContent::GenericText { model } => {
                    expand_generic_line(script.name(), line.index, model, registry, sink, &mut commands);
                }
                LineContent::Empty | LineContent::Comment { .. } | LineContent::Label { .. } => {}
            }
        }

        Self {
            script_name: script.name().to_string(),
            commands,
            labels: script.labels().map(|(l, i)| (l.to_string(), i)).collect(),
            line_count: script.line_count(),
        }
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn label_line(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Index of the first command originating at or after `line_index`.
    /// This is how a goto targets a label line that itself produces no
    /// command.
    pub fn index_at_or_after_line(&self, line_index: usize) -> Option<usize> {
        self.commands
            .iter()
            .position(|c| c.spot.line_index >= line_index)
    }

    /// Index of the command with exactly this spot.
    pub fn index_at_spot(&self, spot: &PlaybackSpot) -> Option<usize> {
        self.commands.iter().position(|c| &c.spot == spot)
    }
}

fn expand_generic_line(
    script_name: &str,
    line_index: usize,
    model: &GenericTextModel,
    registry: &CommandRegistry,
    sink: &mut Diagnostics,
    commands: &mut Vec<Command>,
) {
    let mut inline_index = 0usize;
    let first_emitted = commands.len();

    if let (Some(author), Some(appearance)) = (&model.author, &model.appearance) {
        commands.push(Command::new(
            PlaybackSpot::new(script_name, line_index, inline_index),
            CommandKind::SetAppearance {
                author: author.clone(),
                appearance: appearance.clone(),
            },
        ));
        inline_index += 1;
    }

    let mut first_print = true;
    for content in &model.content {
        match content {
            GenericContent::Text(value) => {
                let spot = PlaybackSpot::new(script_name, line_index, inline_index);
                commands.push(Command::new(
                    spot.clone(),
                    CommandKind::Print {
                        text: ParamValue::from_mixed(value, &spot),
                        author: model.author.clone(),
                        appearance: model.appearance.clone(),
                        // First print of the line breaks prior printer
                        // content; later prints of the same line append.
                        reset_printer: first_print,
                    },
                ));
                first_print = false;
            }
            GenericContent::Inline(inline_model) => {
                if let Some(cmd) =
                    registry.bind(inline_model, script_name, line_index, inline_index, sink)
                {
                    commands.push(cmd);
                }
            }
        }
        inline_index += 1;
    }

    // By default every displayed line pauses for the reader.
    let ends_blocking = commands[first_emitted..]
        .last()
        .is_some_and(Command::is_blocking_wait);
    if commands.len() > first_emitted && !ends_blocking {
        commands.push(Command::new(
            PlaybackSpot::new(script_name, line_index, inline_index),
            CommandKind::WaitInput,
        ));
    }
}
