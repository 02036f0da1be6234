//! Line lexer: turns one raw script line into a classified token sequence.
//!
//! The lexer is single-pass and keeps no state across lines. It never
//! aborts: malformed input (unterminated quotes, expressions, or inline
//! commands) is reported through the [`Diagnostics`] sink and a best-effort
//! token sequence is returned so downstream parsing can still proceed.

use crate::error::{Diagnostics, ParseError};


pub const COMMENT_MARKER: char = ';';
pub const LABEL_MARKER: char = '#';
pub const COMMAND_MARKER: char = '@';
pub const INLINE_OPEN: char = '[';
pub const INLINE_CLOSE: char = ']';
pub const EXPRESSION_OPEN: char = '{';
pub const EXPRESSION_CLOSE: char = '}';

/// Classification of a whole source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Empty,
    Comment,
    Label,
    Command,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    CommentMarker,
    CommentText,
    LabelMarker,
    CommandMarker,
    /// Command or label identifier.
    Identifier,
    /// Parameter name preceding a `:` in a command.
    ParameterId,
    /// A literal run inside a parameter value.
    ParameterValue,
    ExpressionOpen,
    ExpressionBody,
    ExpressionClose,
    InlineOpen,
    InlineClose,
    /// Speaking author id at the start of a generic text line.
    AuthorId,
    /// Author appearance following `Author.`.
    AppearanceId,
    /// A literal text run in a generic text line.
    Text,
}

/// A tagged span of one source line.
///
/// `start`/`length` are byte offsets into the raw line; `text` is the
/// decoded content (quotes stripped, escapes resolved), which is why it can
/// differ from the raw slice the span covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub length: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            length: end - start,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Tokenize one line, classifying it and producing its token sequence.
///
/// `line_index` is the 0-based line position used for error attribution.
pub fn tokenize(line: &str, line_index: usize, sink: &mut Diagnostics) -> (LineKind, Vec<Token>) {
    let mut scanner = Scanner::new(line, line_index);
    scanner.skip_whitespace();

    let first = match scanner.peek() {
        Some(c) => c,
        None => return (LineKind::Empty, Vec::new()),
    };

    match first {
        COMMENT_MARKER => {
            let marker_start = scanner.pos;
            scanner.bump();
            let mut tokens = vec![Token::new(
                TokenKind::CommentMarker,
                COMMENT_MARKER,
                marker_start,
                scanner.pos,
            )];
            scanner.skip_whitespace();
            let start = scanner.pos;
            let text = scanner.rest_trimmed();
            if !text.is_empty() {
                tokens.push(Token::new(TokenKind::CommentText, text, start, start + text.len()));
            }
            (LineKind::Comment, tokens)
        }
        LABEL_MARKER => {
            let marker_start = scanner.pos;
            scanner.bump();
            let mut tokens = vec![Token::new(
                TokenKind::LabelMarker,
                LABEL_MARKER,
                marker_start,
                scanner.pos,
            )];
            scanner.skip_whitespace();
            let start = scanner.pos;
            let name = scanner.rest_trimmed();
            if name.is_empty() {
                sink.parse(ParseError::MissingLabelName { line: line_index });
            } else {
                tokens.push(Token::new(TokenKind::Identifier, name, start, start + name.len()));
            }
            (LineKind::Label, tokens)
        }
        COMMAND_MARKER => {
            let mut tokens = Vec::new();
            lex_command(&mut scanner, &mut tokens, None, sink);
            (LineKind::Command, tokens)
        }
        _ => {
            let mut tokens = Vec::new();
            lex_generic(&mut scanner, &mut tokens, sink);
            (LineKind::Generic, tokens)
        }
    }
}

/// Lex a `@command` body starting at the marker. When `terminator` is set
/// the command is inline and ends at that character (left unconsumed for
/// the caller). Works for both `@name p:v` lines and `[name p:v]` bodies.
fn lex_command(
    scanner: &mut Scanner,
    tokens: &mut Vec<Token>,
    terminator: Option<char>,
    sink: &mut Diagnostics,
) {
    let marker_start = scanner.pos;
    if scanner.peek() == Some(COMMAND_MARKER) {
        scanner.bump();
        tokens.push(Token::new(
            TokenKind::CommandMarker,
            COMMAND_MARKER,
            marker_start,
            scanner.pos,
        ));
    }

    let id_start = scanner.pos;
    let id = scanner.eat_while(|c| c.is_alphanumeric() || c == '_');
    if id.is_empty() {
        sink.parse(ParseError::MissingCommandId {
            line: scanner.line_index,
        });
    } else {
        tokens.push(Token::new(TokenKind::Identifier, id, id_start, scanner.pos));
    }

    loop {
        scanner.skip_whitespace();
        match scanner.peek() {
            None => break,
            Some(c) if Some(c) == terminator => break,
            Some(_) => lex_parameter(scanner, tokens, terminator, sink),
        }
    }
}

/// Lex one parameter: an optional `name:` prefix followed by value parts.
fn lex_parameter(
    scanner: &mut Scanner,
    tokens: &mut Vec<Token>,
    terminator: Option<char>,
    sink: &mut Diagnostics,
) {
    if let Some((name, colon_end)) = scanner.peek_parameter_id() {
        let start = scanner.pos;
        tokens.push(Token::new(TokenKind::ParameterId, name, start, colon_end - 1));
        scanner.pos = colon_end;
    }
    lex_value_parts(scanner, tokens, TokenKind::ParameterValue, terminator, sink);
}

/// Lex value parts until unquoted whitespace, the terminator, or the end of
/// the line. Emits literal runs interleaved with expression token triples.
fn lex_value_parts(
    scanner: &mut Scanner,
    tokens: &mut Vec<Token>,
    literal_kind: TokenKind,
    terminator: Option<char>,
    sink: &mut Diagnostics,
) {
    let mut buf = String::new();
    let mut buf_start = scanner.pos;

    loop {
        let c = match scanner.peek() {
            Some(c) => c,
            None => break,
        };
        if c.is_whitespace() || Some(c) == terminator {
            break;
        }
        match c {
            '"' => {
                let quote_start = scanner.pos;
                scanner.bump();
                let mut terminated = false;
                while let Some(q) = scanner.peek() {
                    scanner.bump();
                    match q {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' => {
                            if let Some(escaped) = scanner.peek() {
                                scanner.bump();
                                buf.push(escaped);
                            }
                        }
                        _ => buf.push(q),
                    }
                }
                if !terminated {
                    sink.parse(ParseError::UnterminatedQuote {
                        line: scanner.line_index,
                        text: scanner.src[quote_start..].to_string(),
                    });
                }
            }
            EXPRESSION_OPEN => {
                flush(&mut buf, buf_start, scanner.pos, literal_kind, tokens);
                lex_expression(scanner, tokens, sink);
                buf_start = scanner.pos;
            }
            '\\' => {
                scanner.bump();
                if let Some(escaped) = scanner.peek() {
                    scanner.bump();
                    buf.push(escaped);
                }
            }
            _ => {
                scanner.bump();
                buf.push(c);
            }
        }
    }

    flush(&mut buf, buf_start, scanner.pos, literal_kind, tokens);
}

/// Lex a `{expression}` triple; the open brace is at the current position.
fn lex_expression(scanner: &mut Scanner, tokens: &mut Vec<Token>, sink: &mut Diagnostics) {
    let open_start = scanner.pos;
    scanner.bump();
    tokens.push(Token::new(
        TokenKind::ExpressionOpen,
        EXPRESSION_OPEN,
        open_start,
        scanner.pos,
    ));

    let body_start = scanner.pos;
    let body = scanner.eat_while(|c| c != EXPRESSION_CLOSE);
    tokens.push(Token::new(
        TokenKind::ExpressionBody,
        body.trim(),
        body_start,
        scanner.pos,
    ));

    if scanner.peek() == Some(EXPRESSION_CLOSE) {
        let close_start = scanner.pos;
        scanner.bump();
        tokens.push(Token::new(
            TokenKind::ExpressionClose,
            EXPRESSION_CLOSE,
            close_start,
            scanner.pos,
        ));
    } else {
        sink.parse(ParseError::UnterminatedExpression {
            line: scanner.line_index,
            text: scanner.src[open_start..].to_string(),
        });
    }
}

/// Lex generic (dialogue) text: an optional `Author.Appearance: ` prefix,
/// then literal runs mixed with `[inline]` commands and `{expressions}`.
fn lex_generic(scanner: &mut Scanner, tokens: &mut Vec<Token>, sink: &mut Diagnostics) {
    lex_author_prefix(scanner, tokens);

    let mut buf = String::new();
    let mut buf_start = scanner.pos;

    while let Some(c) = scanner.peek() {
        match c {
            INLINE_OPEN => {
                flush(&mut buf, buf_start, scanner.pos, TokenKind::Text, tokens);
                let open_start = scanner.pos;
                scanner.bump();
                tokens.push(Token::new(
                    TokenKind::InlineOpen,
                    INLINE_OPEN,
                    open_start,
                    scanner.pos,
                ));
                lex_command(scanner, tokens, Some(INLINE_CLOSE), sink);
                if scanner.peek() == Some(INLINE_CLOSE) {
                    let close_start = scanner.pos;
                    scanner.bump();
                    tokens.push(Token::new(
                        TokenKind::InlineClose,
                        INLINE_CLOSE,
                        close_start,
                        scanner.pos,
                    ));
                } else {
                    sink.parse(ParseError::UnterminatedInline {
                        line: scanner.line_index,
                        text: scanner.src[open_start..].to_string(),
                    });
                }
                buf_start = scanner.pos;
            }
            EXPRESSION_OPEN => {
                flush(&mut buf, buf_start, scanner.pos, TokenKind::Text, tokens);
                lex_expression(scanner, tokens, sink);
                buf_start = scanner.pos;
            }
            '\\' => {
                scanner.bump();
                if let Some(escaped) = scanner.peek() {
                    scanner.bump();
                    buf.push(escaped);
                }
            }
            _ => {
                scanner.bump();
                buf.push(c);
            }
        }
    }

    // Trailing whitespace belongs to the line, not the content.
    while buf.ends_with(char::is_whitespace) {
        buf.pop();
    }
    flush(&mut buf, buf_start, scanner.pos, TokenKind::Text, tokens);
}

/// Recognize `Author: ` or `Author.Appearance: ` at the current position.
/// The author must be a bare identifier and the colon must be followed by a
/// space, otherwise the whole run is plain dialogue text.
fn lex_author_prefix(scanner: &mut Scanner, tokens: &mut Vec<Token>) {
    let saved = scanner.pos;

    let author_start = scanner.pos;
    let author = scanner.eat_while(|c| c.is_alphanumeric() || c == '_');
    if author.is_empty() {
        scanner.pos = saved;
        return;
    }
    let author_token = Token::new(TokenKind::AuthorId, author, author_start, scanner.pos);

    let mut appearance_token = None;
    if scanner.peek() == Some('.') {
        scanner.bump();
        let app_start = scanner.pos;
        let appearance = scanner.eat_while(|c| c.is_alphanumeric() || c == '_');
        if appearance.is_empty() {
            scanner.pos = saved;
            return;
        }
        appearance_token = Some(Token::new(
            TokenKind::AppearanceId,
            appearance,
            app_start,
            scanner.pos,
        ));
    }

    if scanner.peek() != Some(':') {
        scanner.pos = saved;
        return;
    }
    scanner.bump();
    if scanner.peek() != Some(' ') {
        scanner.pos = saved;
        return;
    }
    scanner.bump();

    tokens.push(author_token);
    if let Some(t) = appearance_token {
        tokens.push(t);
    }
}

fn flush(buf: &mut String, start: usize, end: usize, kind: TokenKind, tokens: &mut Vec<Token>) {
    if !buf.is_empty() {
        tokens.push(Token::new(kind, std::mem::take(buf), start, end));
    } else {
        buf.clear();
    }
}

/// Byte-indexed cursor over one line. All slicing respects char boundaries.
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line_index: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, line_index: usize) -> Self {
        Self {
            src,
            pos: 0,
            line_index,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    /// Rest of the line with trailing whitespace removed.
    fn rest_trimmed(&self) -> &'a str {
        self.src[self.pos..].trim_end()
    }

    /// Look ahead for `identifier:` without consuming. Returns the name and
    /// the byte position just past the colon.
    fn peek_parameter_id(&self) -> Option<(&'a str, usize)> {
        let rest = &self.src[self.pos..];
        let mut end = 0;
        for c in rest.chars() {
            if c.is_alphanumeric() || c == '_' {
                end += c.len_utf8();
            } else {
                break;
            }
        }
        if end == 0 {
            return None;
        }
        if rest[end..].starts_with(':') {
            Some((&rest[..end], self.pos + end + 1))
        } else {
            None
        }
    }
}
