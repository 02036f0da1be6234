//! Error taxonomy for parsing, binding, navigation, and execution.
//!
//! Parse and bind problems are accumulated into a [`Diagnostics`] batch so
//! script authors see every issue in one pass; navigation and execution
//! problems are reported at their point of occurrence with the
//! [`PlaybackSpot`] they happened at.

use crate::commands::PlaybackSpot;
use thiserror::Error;

/// Lexer and line-parser anomalies.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unterminated expression at line {line}: `{text}`")]
    UnterminatedExpression { line: usize, text: String },

    #[error("unterminated quoted value at line {line}: `{text}`")]
    UnterminatedQuote { line: usize, text: String },

    #[error("unterminated inline command at line {line}: `{text}`")]
    UnterminatedInline { line: usize, text: String },

    #[error("missing command identifier at line {line}")]
    MissingCommandId { line: usize },

    #[error("missing label name at line {line}")]
    MissingLabelName { line: usize },

    #[error("duplicate label '{label}' at line {line} (first defined at line {first})")]
    DuplicateLabel {
        label: String,
        line: usize,
        first: usize,
    },
}

impl ParseError {
    /// 0-based index of the line the error was reported for.
    pub fn line(&self) -> usize {
        match self {
            Self::UnterminatedExpression { line, .. }
            | Self::UnterminatedQuote { line, .. }
            | Self::UnterminatedInline { line, .. }
            | Self::MissingCommandId { line }
            | Self::MissingLabelName { line }
            | Self::DuplicateLabel { line, .. } => *line,
        }
    }
}

/// Command-binding failures (spec'd command metadata vs. script text).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindError {
    #[error("command '{id}' not found at line {line}")]
    CommandNotFound { id: String, line: usize },

    #[error("missing required parameter '{param}' for command '{command}' at line {line}")]
    MissingParameter {
        command: String,
        param: String,
        line: usize,
    },

    #[error("unsupported parameter '{param}' for command '{command}' at line {line}")]
    UnsupportedParameter {
        command: String,
        param: String,
        line: usize,
    },

    #[error(
        "invalid value '{value}' for parameter '{param}' of command '{command}' at line {line}: {reason}"
    )]
    InvalidParameterValue {
        command: String,
        param: String,
        value: String,
        line: usize,
        reason: String,
    },
}

impl BindError {
    pub fn line(&self) -> usize {
        match self {
            Self::CommandNotFound { line, .. }
            | Self::MissingParameter { line, .. }
            | Self::UnsupportedParameter { line, .. }
            | Self::InvalidParameterValue { line, .. } => *line,
        }
    }
}

/// Playback navigation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavigationError {
    #[error("script '{script}' not found")]
    ScriptNotFound { script: String },

    #[error("label '{label}' not found in script '{script}'")]
    UndefinedLabel { script: String, label: String },

    #[error("return with empty gosub stack at {spot}")]
    EmptyReturnStack { spot: PlaybackSpot },

    #[error("invalid navigation path '{path}' at {spot}")]
    InvalidPath { path: String, spot: PlaybackSpot },

    #[error("cannot rewind to line {line}: {reason}")]
    RewindUnreachable { line: usize, reason: String },

    #[error("nothing is playing")]
    NothingPlaying,
}

/// A command body faulted while executing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("expression `{body}` failed at {spot}: {message}")]
    Expression {
        body: String,
        spot: PlaybackSpot,
        message: String,
    },

    #[error("invalid runtime value '{value}' at {spot}: {reason}")]
    InvalidValue {
        value: String,
        spot: PlaybackSpot,
        reason: String,
    },

    #[error("command failed at {spot}: {message}")]
    Command { spot: PlaybackSpot, message: String },
}

/// Umbrella error for the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("script '{script}' has {count} parse/bind error(s); first: {first}")]
    ScriptDiagnostics {
        script: String,
        count: usize,
        first: String,
    },

    #[error("corrupt save data: {reason}")]
    CorruptSaveData { reason: String },
}

/// A single accumulated parse- or bind-time diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Parse(ParseError),
    Bind(BindError),
}

impl Diagnostic {
    pub fn line(&self) -> usize {
        match self {
            Self::Parse(e) => e.line(),
            Self::Bind(e) => e.line(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Bind(e) => write!(f, "{e}"),
        }
    }
}

/// Batched error sink for one script's parse/bind pass.
///
/// Lexing, line parsing, and binding never abort on an anomaly; they report
/// it here and keep going, so one pass surfaces every problem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, error: ParseError) {
        self.items.push(Diagnostic::Parse(error));
    }

    pub fn bind(&mut self, error: BindError) {
        self.items.push(Diagnostic::Bind(error));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Diagnostics reported for one specific line.
    pub fn for_line(&self, line: usize) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.line() == line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_accumulate_in_order() {
        let mut diags = Diagnostics::new();
        diags.parse(ParseError::MissingLabelName { line: 2 });
        diags.bind(BindError::CommandNotFound {
            id: "nope".into(),
            line: 5,
        });

        assert_eq!(diags.len(), 2);
        assert_eq!(diags.iter().next().unwrap().line(), 2);
        assert_eq!(diags.for_line(5).count(), 1);
    }

    #[test]
    fn errors_render_line_numbers() {
        let err = BindError::UnsupportedParameter {
            command: "bgm".into(),
            param: "foo".into(),
            line: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("foo"));
        assert!(msg.contains('7'));
    }
}
