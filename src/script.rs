//! Script model: the ordered, hashed sequence of parsed lines for one
//! script unit, with a label index for navigation.
//!
//! A `Script` is immutable after parsing; a modified source text produces a
//! new `Script` value which is compared line-by-line via hash against the
//! old one for hot-reload diffing.

use crate::error::{Diagnostics, ParseError};
use crate::lexer::{LineKind, tokenize};
use crate::parsing::{
    CommandLineModel, GenericTextModel, parse_command_line, parse_comment_line, parse_generic_line,
    parse_label_line,
};
use std::collections::BTreeMap;

/// Persistent hash of one line's trimmed text. Stable across re-parses of
/// unchanged text; depends only on the trimmed line, never on the line's
/// index or surroundings.
pub type LineHash = [u8; 16];

pub fn hash_line(text: &str) -> LineHash {
    md5::compute(text.trim().as_bytes()).0
}

/// One classified, parsed source line.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    /// 0-based position in the owning script.
    pub index: usize,
    pub hash: LineHash,
    pub content: LineContent,
}

/// Closed variant over the line kinds a script can contain.
#[derive(Debug, Clone, PartialEq)]
pub enum LineContent {
    Empty,
    Comment { text: String },
    Label { name: String },
    Command { model: CommandLineModel },
    GenericText { model: GenericTextModel },
}

/// A parsed script: ordered lines plus derived indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    name: String,
    lines: Vec<ScriptLine>,
    labels: BTreeMap<String, usize>,
}

impl Script {
    /// Parse raw text into a script. Never fails outright: anomalies are
    /// accumulated into the returned [`Diagnostics`] and the script is
    /// built best-effort from whatever parsed.
    pub fn parse_text(name: impl Into<String>, text: &str) -> (Self, Diagnostics) {
        let name = name.into();
        let mut sink = Diagnostics::new();
        let mut lines = Vec::new();
        let mut labels: BTreeMap<String, usize> = BTreeMap::new();

        for (index, raw) in text.lines().enumerate() {
            let (kind, tokens) = tokenize(raw, index, &mut sink);
            let content = match kind {
                LineKind::Empty => LineContent::Empty,
                LineKind::Comment => LineContent::Comment {
                    text: parse_comment_line(&tokens),
                },
                LineKind::Label => match parse_label_line(&tokens) {
                    Some(label) => {
                        if let Some(&first) = labels.get(&label) {
                            // First occurrence wins; duplicates are
                            // reported but do not replace the mapping.
                            sink.parse(ParseError::DuplicateLabel {
                                label: label.clone(),
                                line: index,
                                first,
                            });
                        } else {
                            labels.insert(label.clone(), index);
                        }
                        LineContent::Label { name: label }
                    }
                    None => LineContent::Empty,
                },
                LineKind::Command => LineContent::Command {
                    model: parse_command_line(&tokens),
                },
                LineKind::Generic => LineContent::GenericText {
                    model: parse_generic_line(&tokens),
                },
            };
            lines.push(ScriptLine {
                index,
                hash: hash_line(raw),
                content,
            });
        }

        (Self { name, lines, labels }, sink)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Resolve a label to its line index. Undefined labels yield `None`;
    /// callers treat that as an error, never a silent no-op.
    pub fn label_line(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, usize)> {
        self.labels.iter().map(|(name, &idx)| (name.as_str(), idx))
    }

    /// Line indices whose trimmed text differs from `newer`, including any
    /// tail lines present in only one version.
    pub fn changed_lines(&self, newer: &Script) -> Vec<usize> {
        let common = self.lines.len().min(newer.lines.len());
        let longest = self.lines.len().max(newer.lines.len());
        let mut changed: Vec<usize> = (0..common)
            .filter(|&i| self.lines[i].hash != newer.lines[i].hash)
            .collect();
        changed.extend(common..longest);
        changed
    }

    /// First line that differs from `newer`, if any.
    pub fn first_changed_line(&self, newer: &Script) -> Option<usize> {
        self.changed_lines(newer).into_iter().next()
    }
}
