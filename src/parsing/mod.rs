//! Line parsers: one per [`LineKind`], each a pure function from a token
//! sequence to a typed line model. Parsing a line never consults other
//! lines or external resources.

use crate::lexer::{Token, TokenKind};


/// One component of a mixed parameter or text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuePart {
    PlainText(String),
    /// Unevaluated `{expression}` body, re-evaluated at execution time.
    Expression(String),
}

/// An ordered mix of literal text and expression placeholders.
///
/// Concatenating the parts (substituting expression results) yields the
/// final string; a value with any expression part is dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MixedValue {
    pub parts: Vec<ValuePart>,
}

impl MixedValue {
    pub fn from_parts(parts: Vec<ValuePart>) -> Self {
        Self { parts }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ValuePart::PlainText(text.into())],
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, ValuePart::Expression(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The literal string, if the value holds no expressions.
    pub fn as_static(&self) -> Option<String> {
        if self.is_dynamic() {
            return None;
        }
        let mut out = String::new();
        for part in &self.parts {
            if let ValuePart::PlainText(t) = part {
                out.push_str(t);
            }
        }
        Some(out)
    }

    /// Source-shaped rendition, expressions re-wrapped in braces. Used for
    /// diagnostics only.
    pub fn to_template(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                ValuePart::PlainText(t) => out.push_str(t),
                ValuePart::Expression(e) => {
                    out.push('{');
                    out.push_str(e);
                    out.push('}');
                }
            }
        }
        out
    }
}

/// One parsed command parameter, named or nameless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterModel {
    pub id: Option<String>,
    pub nameless: bool,
    pub value: MixedValue,
    /// True when the value embeds expressions and must be re-evaluated at
    /// execution time rather than bound once at parse time.
    pub dynamic: bool,
}

impl ParameterModel {
    fn new(id: Option<String>, value: MixedValue) -> Self {
        let nameless = id.is_none();
        let dynamic = value.is_dynamic();
        Self {
            id,
            nameless,
            value,
            dynamic,
        }
    }

    /// Name used in diagnostics for this parameter.
    pub fn display_name(&self) -> &str {
        self.id.as_deref().unwrap_or("nameless")
    }
}

/// Parsed `@command` invocation (also used for inline `[command]` bodies).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineModel {
    pub id: String,
    pub params: Vec<ParameterModel>,
}

impl CommandLineModel {
    pub fn nameless_param(&self) -> Option<&ParameterModel> {
        self.params.iter().find(|p| p.nameless)
    }

    pub fn named_param(&self, name: &str) -> Option<&ParameterModel> {
        self.params.iter().find(|p| p.id.as_deref() == Some(name))
    }
}

/// One ordered piece of a generic text line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericContent {
    /// A literal text run (possibly with embedded expressions).
    Text(MixedValue),
    /// An inline command invocation embedded in the dialogue.
    Inline(CommandLineModel),
}

/// Parsed generic (dialogue) line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenericTextModel {
    pub author: Option<String>,
    pub appearance: Option<String>,
    pub content: Vec<GenericContent>,
}

/// Parse a comment line's tokens into the comment text.
pub fn parse_comment_line(tokens: &[Token]) -> String {
    tokens
        .iter()
        .find(|t| t.kind == TokenKind::CommentText)
        .map(|t| t.text.clone())
        .unwrap_or_default()
}

/// Parse a label line's tokens into the label name, if present.
pub fn parse_label_line(tokens: &[Token]) -> Option<String> {
    tokens
        .iter()
        .find(|t| t.kind == TokenKind::Identifier)
        .map(|t| t.text.clone())
}

/// Parse a command line's tokens into a [`CommandLineModel`].
pub fn parse_command_line(tokens: &[Token]) -> CommandLineModel {
    parse_command_tokens(tokens)
}

fn parse_command_tokens(tokens: &[Token]) -> CommandLineModel {
    let mut id = String::new();
    let mut params: Vec<ParameterModel> = Vec::new();

    // Current parameter being assembled.
    let mut current_id: Option<String> = None;
    let mut current_parts: Vec<ValuePart> = Vec::new();
    let mut in_param = false;
    // End offset of the previous value-bearing token; a gap between spans
    // means unquoted whitespace, which separates parameters.
    let mut prev_end = 0usize;

    let flush =
        |id: &mut Option<String>, parts: &mut Vec<ValuePart>, params: &mut Vec<ParameterModel>| {
            params.push(ParameterModel::new(
                id.take(),
                MixedValue::from_parts(std::mem::take(parts)),
            ));
        };

    for token in tokens {
        match token.kind {
            TokenKind::CommandMarker => {}
            TokenKind::Identifier if id.is_empty() => {
                id = token.text.clone();
                prev_end = token.end();
            }
            TokenKind::ParameterId => {
                if in_param {
                    flush(&mut current_id, &mut current_parts, &mut params);
                }
                current_id = Some(token.text.clone());
                in_param = true;
                prev_end = token.end() + 1; // past the colon
            }
            TokenKind::ParameterValue
            | TokenKind::ExpressionOpen
            | TokenKind::ExpressionBody
            | TokenKind::ExpressionClose => {
                let starts_new = in_param && token.start > prev_end;
                if starts_new || (!in_param) {
                    if in_param {
                        flush(&mut current_id, &mut current_parts, &mut params);
                    }
                    in_param = true;
                }
                match token.kind {
                    TokenKind::ParameterValue => {
                        current_parts.push(ValuePart::PlainText(token.text.clone()));
                    }
                    TokenKind::ExpressionBody => {
                        current_parts.push(ValuePart::Expression(token.text.clone()));
                    }
                    _ => {}
                }
                prev_end = token.end();
            }
            _ => {}
        }
    }
    if in_param {
        flush(&mut current_id, &mut current_parts, &mut params);
    }

    CommandLineModel { id, params }
}

/// Parse a generic text line's tokens into a [`GenericTextModel`].
pub fn parse_generic_line(tokens: &[Token]) -> GenericTextModel {
    let mut model = GenericTextModel::default();
    let mut run: Vec<ValuePart> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::AuthorId => model.author = Some(token.text.clone()),
            TokenKind::AppearanceId => model.appearance = Some(token.text.clone()),
            TokenKind::Text => run.push(ValuePart::PlainText(token.text.clone())),
            TokenKind::ExpressionBody => run.push(ValuePart::Expression(token.text.clone())),
            TokenKind::InlineOpen => {
                if !run.is_empty() {
                    model
                        .content
                        .push(GenericContent::Text(MixedValue::from_parts(std::mem::take(
                            &mut run,
                        ))));
                }
                let inner_start = i + 1;
                let mut inner_end = inner_start;
                while inner_end < tokens.len() && tokens[inner_end].kind != TokenKind::InlineClose {
                    inner_end += 1;
                }
                model.content.push(GenericContent::Inline(parse_command_tokens(
                    &tokens[inner_start..inner_end],
                )));
                i = inner_end; // InlineClose (or end) consumed by the += 1 below
            }
            _ => {}
        }
        i += 1;
    }

    if !run.is_empty() {
        model
            .content
            .push(GenericContent::Text(MixedValue::from_parts(run)));
    }

    model
}
