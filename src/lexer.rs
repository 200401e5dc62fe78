// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Tokenizer for the Python grammar understood by [`crate::syntax`].
//!
//! Produces the same logical structure as CPython's tokenizer: `NEWLINE`
//! terminates a logical line, `INDENT`/`DEDENT` bracket blocks, and newlines
//! inside brackets are implicit line joins. String literals are decoded here
//! so the parser only ever sees their final value.

use crate::syntax::SyntaxError;

/// Operators and delimiters, longest first so the first match wins.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "**", "//", ">>", "<<", "<=", ">=", "==", "!=",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "+", "-", "*", "/", "%", "@", "&", "|",
    "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ";", ".", "=",
];

/// Bracket nesting limit, matching CPython's tokenizer.
const MAX_BRACKET_DEPTH: usize = 200;

/// Indented block limit, matching CPython's tokenizer.
const MAX_INDENT_DEPTH: usize = 100;

/// `\N{...}` names decoded in text literals. Other names are kept verbatim.
const CHARACTER_NAMES: &[(&str, char)] = &[
    ("BULLET", '\u{2022}'),
    ("COPYRIGHT SIGN", '\u{a9}'),
    ("DEGREE SIGN", '\u{b0}'),
    ("EM DASH", '\u{2014}'),
    ("EN DASH", '\u{2013}'),
    ("EURO SIGN", '\u{20ac}'),
    ("HORIZONTAL ELLIPSIS", '\u{2026}'),
    ("LEFT DOUBLE QUOTATION MARK", '\u{201c}'),
    ("LEFT SINGLE QUOTATION MARK", '\u{2018}'),
    ("NO-BREAK SPACE", '\u{a0}'),
    ("RIGHTWARDS ARROW", '\u{2192}'),
    ("RIGHT DOUBLE QUOTATION MARK", '\u{201d}'),
    ("RIGHT SINGLE QUOTATION MARK", '\u{2019}'),
    ("ZERO WIDTH SPACE", '\u{200b}'),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Name(String),
    Number,
    Str(StrToken),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrKind {
    Text,
    Bytes,
    Format,
}

/// A single string literal token. `value` is decoded for plain text literals
/// and kept verbatim for bytes and f-strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrToken {
    pub kind: StrKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Splits Python source into tokens.
///
/// Line endings must already be normalized to `\n`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source.strip_prefix('\u{feff}').unwrap_or(source)).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    line_start: usize,
    at_line_start: bool,
    indents: Vec<usize>,
    brackets: Vec<(char, usize, usize)>,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            line_start: 0,
            at_line_start: true,
            indents: vec![0],
            brackets: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    const fn column(&self) -> usize {
        self.pos - self.line_start + 1
    }

    fn error(&self, reason: impl Into<String>) -> SyntaxError {
        SyntaxError::new(reason, self.line, self.column())
    }

    /// Consumes one character, keeping line bookkeeping for embedded newlines.
    fn bump(&mut self) {
        if self.peek() == Some('\n') {
            self.line += 1;
            self.line_start = self.pos + 1;
        }
        self.pos += 1;
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token { kind, line, column });
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        loop {
            if self.at_line_start && self.brackets.is_empty() && !self.indentation()? {
                continue;
            }
            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\n' => {
                    let (line, column) = (self.line, self.column());
                    self.bump();
                    if self.brackets.is_empty() {
                        if self
                            .tokens
                            .last()
                            .is_some_and(|t| t.kind != TokenKind::Newline)
                        {
                            self.push(TokenKind::Newline, line, column);
                        }
                        self.at_line_start = true;
                    }
                }
                '\\' => self.continuation()?,
                '"' | '\'' => self.string("")?,
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    self.number();
                }
                c if is_identifier_start(c) => self.name_or_string()?,
                _ => self.operator()?,
            }
        }
        self.finish()
    }

    /// Measures indentation at the start of a logical line.
    ///
    /// Returns `false` when the line was blank or comment-only and has been
    /// consumed entirely.
    fn indentation(&mut self) -> Result<bool, SyntaxError> {
        let mut width = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek() {
            None => {
                self.at_line_start = false;
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.bump();
                }
                return Ok(false);
            }
            Some('\n') => {
                self.bump();
                return Ok(false);
            }
            Some(_) => {}
        }

        self.at_line_start = false;
        let (line, column) = (self.line, self.column());
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            if self.indents.len() > MAX_INDENT_DEPTH {
                return Err(self.error("too many levels of indentation"));
            }
            self.indents.push(width);
            self.push(TokenKind::Indent, line, column);
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent, line, column);
            }
            if self.indents.last() != Some(&width) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(true)
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn continuation(&mut self) -> Result<(), SyntaxError> {
        match self.peek_at(1) {
            Some('\n') => {
                self.pos += 1;
                self.bump();
                Ok(())
            }
            None => Err(self.error("unexpected EOF while parsing")),
            Some(_) => Err(self.error("unexpected character after line continuation character")),
        }
    }

    fn number(&mut self) {
        let (line, column) = (self.line, self.column());
        let hex = self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X'));
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && !hex
                && matches!(self.chars.get(self.pos - 1), Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, line, column);
    }

    fn name_or_string(&mut self) -> Result<(), SyntaxError> {
        let (line, column) = (self.line, self.column());
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_continue) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(), Some('"' | '\'')) && is_string_prefix(&name) {
            return self.string(&name.to_ascii_lowercase());
        }

        self.push(TokenKind::Name(name), line, column);
        Ok(())
    }

    fn string(&mut self, prefix: &str) -> Result<(), SyntaxError> {
        let (line, column) = (self.line, self.column() - prefix.len());
        let kind = if prefix.contains('b') {
            StrKind::Bytes
        } else if prefix.contains('f') {
            StrKind::Format
        } else {
            StrKind::Text
        };
        let raw = prefix.contains('r');

        let Some(quote) = self.peek() else {
            return Err(self.error("unterminated string literal"));
        };
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let unterminated = || {
            let reason = if triple {
                "unterminated triple-quoted string literal"
            } else {
                "unterminated string literal"
            };
            SyntaxError::new(reason, line, column)
        };

        let mut body = String::new();
        loop {
            match self.peek() {
                None => return Err(unterminated()),
                Some('\n') if !triple => return Err(unterminated()),
                Some(c) if c == quote => {
                    if !triple {
                        self.pos += 1;
                        break;
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.pos += 3;
                        break;
                    }
                    body.push(c);
                    self.pos += 1;
                }
                Some('\\') => {
                    body.push('\\');
                    self.pos += 1;
                    if let Some(next) = self.peek() {
                        body.push(next);
                        self.bump();
                    }
                }
                Some(c) => {
                    body.push(c);
                    self.bump();
                }
            }
        }

        let value = match kind {
            StrKind::Bytes if !body.is_ascii() => {
                return Err(SyntaxError::new(
                    "bytes can only contain ASCII literal characters",
                    line,
                    column,
                ));
            }
            StrKind::Text if !raw => {
                decode_escapes(&body).map_err(|reason| SyntaxError::new(reason, line, column))?
            }
            _ => body,
        };

        self.push(TokenKind::Str(StrToken { kind, value }), line, column);
        Ok(())
    }

    fn operator(&mut self) -> Result<(), SyntaxError> {
        let (line, column) = (self.line, self.column());
        let rest = &self.chars[self.pos..];
        let Some(op) = OPERATORS
            .iter()
            .copied()
            .find(|op| rest.len() >= op.len() && op.chars().zip(rest).all(|(a, &b)| a == b))
        else {
            let c = rest[0];
            return Err(self.error(format!(
                "invalid character '{c}' (U+{:04X})",
                u32::from(c)
            )));
        };

        match op {
            "(" | "[" | "{" => {
                if self.brackets.len() >= MAX_BRACKET_DEPTH {
                    return Err(self.error("too many nested parentheses"));
                }
                let open = rest[0];
                self.brackets.push((open, line, column));
            }
            ")" | "]" | "}" => {
                let close = rest[0];
                let Some((open, _, _)) = self.brackets.pop() else {
                    return Err(self.error(format!("unmatched '{close}'")));
                };
                if matching_close(open) != close {
                    return Err(self.error(format!(
                        "closing parenthesis '{close}' does not match opening parenthesis '{open}'"
                    )));
                }
            }
            _ => {}
        }

        self.pos += op.len();
        self.push(TokenKind::Op(op), line, column);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Token>, SyntaxError> {
        if let Some(&(open, line, column)) = self.brackets.first() {
            return Err(SyntaxError::new(
                format!("'{open}' was never closed"),
                line,
                column,
            ));
        }

        let (line, column) = (self.line, self.column());
        if self
            .tokens
            .last()
            .is_some_and(|t| t.kind != TokenKind::Newline)
        {
            self.push(TokenKind::Newline, line, column);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, column);
        }
        self.push(TokenKind::EndMarker, line, column);
        Ok(self.tokens)
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_identifier_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_string_prefix(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

const fn matching_close(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn lookup_character(name: &str) -> Option<char> {
    let name = name.to_ascii_uppercase();
    CHARACTER_NAMES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|&(_, c)| c)
}

/// Decodes backslash escapes in a non-raw text literal body.
///
/// Unknown escapes are kept verbatim, as Python does. `\N{...}` is decoded
/// for the names in [`CHARACTER_NAMES`] and kept verbatim otherwise.
fn decode_escapes(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(escape),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            'x' | 'u' | 'U' => {
                let width = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let mut value = 0u32;
                for _ in 0..width {
                    let digit = chars
                        .next()
                        .and_then(|d| d.to_digit(16))
                        .ok_or_else(|| format!("(unicode error) truncated \\{escape} escape"))?;
                    value = value * 16 + digit;
                }
                let decoded = char::from_u32(value)
                    .ok_or_else(|| "(unicode error) illegal Unicode character".to_owned())?;
                out.push(decoded);
            }
            'N' if chars.peek() == Some(&'{') => {
                let name: String = chars.by_ref().skip(1).take_while(|&c| c != '}').collect();
                match lookup_character(&name) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\N{");
                        out.push_str(&name);
                        out.push('}');
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}
