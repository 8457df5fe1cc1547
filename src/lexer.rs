// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;

use serde::{Deserialize, Serialize};

/// Position of a node or token in expression source text.
///
/// `line` and `column` are 1-based; `offset` is the 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Render a caret diagnostic pointing at `line`/`col` of `contents`.
pub fn message(file: &str, contents: &str, line: u32, col: u32, kind: &str, msg: &str) -> String {
    let lines: Vec<&str> = contents.split('\n').collect();
    if line == 0 || line as usize > lines.len() {
        return format!("{file}: invalid line {line} specified");
    }

    let line_str = format!("{line}");
    let line_num_width = line_str.len() + 1;
    let col_spaces = (col as usize).saturating_sub(1);
    let source_line = lines[line as usize - 1].trim_end_matches('\r');

    format!(
        "\n--> {}:{}:{}\n{:<line_num_width$}|\n\
         {:<line_num_width$}| {}\n\
         {:<line_num_width$}| {:<col_spaces$}^\n\
         {}: {}",
        file, line, col, "", line, source_line, "", "", kind, msg
    )
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start as usize..self.end as usize]
    }

    pub const fn source_span(&self) -> SourceSpan {
        SourceSpan {
            line: self.line,
            column: self.col,
            offset: self.start,
        }
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}:{}:{}:{}", self.line, self.col, self.start, self.end)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Symbol,
    String,
    Number,
    Ident,
    Eof,
}

#[derive(Debug, Clone, Copy)]
pub struct Token(pub TokenKind, pub Span);

/// Failure to tokenize or parse expression source.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at {span}")]
pub struct ParseError {
    pub message: String,
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Caret diagnostic for this error against the source it was produced from.
    pub fn render(&self, source: &str) -> String {
        message(
            "expression",
            source,
            self.span.line,
            self.span.column,
            "error",
            &self.message,
        )
    }
}

#[derive(Clone)]
pub struct Lexer<'source> {
    source: &'source str,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            iter: source.char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    pub const fn source(&self) -> &'source str {
        self.source
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.len(), '\x00'),
        }
    }

    fn error(&self, col: u32, offset: usize, msg: &str) -> ParseError {
        ParseError::new(
            msg,
            SourceSpan {
                line: self.line,
                column: col,
                offset: offset as u32,
            },
        )
    }

    fn span(&self, col: u32, start: usize, end: usize) -> Span {
        Span {
            line: self.line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn read_ident(&mut self) -> Token {
        let start = self.peek().0;
        let col = self.col;
        loop {
            let ch = self.peek().1;
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.iter.next();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        self.col += (end - start) as u32;
        Token(TokenKind::Ident, self.span(col, start, end))
    }

    fn read_digits(&mut self) {
        while self.peek().1.is_ascii_digit() {
            self.iter.next();
        }
    }

    // See https://www.json.org/json-en.html for number's grammar
    fn read_number(&mut self) -> Result<Token, ParseError> {
        let (start, chr) = self.peek();
        let col = self.col;
        self.iter.next();

        if chr != '0' {
            self.read_digits();
        }

        // . must be followed by at least 1 digit.
        if self.peek().1 == '.' && self.peekahead(1).1.is_ascii_digit() {
            self.iter.next();
            self.read_digits();
        }

        let ch = self.peek().1;
        if ch == 'e' || ch == 'E' {
            self.iter.next();
            if matches!(self.peek().1, '+' | '-') {
                self.iter.next();
            }
            self.read_digits();
        }

        let end = self.peek().0;
        self.col += (end - start) as u32;

        let ch = self.peek().1;
        if ch == '_' || ch.is_ascii_alphanumeric() {
            return Err(self.error(self.col, end, "invalid number"));
        }

        if serde_json::from_str::<serde_json::Number>(&self.source[start..end]).is_err() {
            return Err(self.error(col, start, "invalid number"));
        }

        Ok(Token(TokenKind::Number, self.span(col, start, end)))
    }

    fn read_string(&mut self) -> Result<Token, ParseError> {
        let col = self.col;
        let (quote, _) = self.peek();
        self.iter.next();
        self.col += 1;
        let start = self.peek().0;
        loop {
            let (offset, ch) = self.peek();
            match ch {
                '"' => break,
                '\x00' if offset >= self.source.len() => {
                    return Err(self.error(col, quote, "unmatched \""));
                }
                '\\' => {
                    self.iter.next();
                    self.iter.next();
                }
                '\n' => return Err(self.error(col, quote, "unmatched \"")),
                _ => {
                    self.iter.next();
                }
            }
        }

        let end = self.peek().0;
        self.iter.next();
        self.col += self.source[start..end].chars().count() as u32 + 1;

        // Escapes follow JSON rules; let serde_json validate them.
        if let Err(e) = serde_json::from_str::<String>(&self.source[quote..end + 1]) {
            return Err(self.error(col, quote, &format!("invalid string literal: {e}")));
        }

        Ok(Token(TokenKind::String, self.span(col, quote, end + 1)))
    }

    fn skip_ws(&mut self) {
        loop {
            match self.peek().1 {
                ' ' | '\r' => self.col += 1,
                '\t' => self.col += 4,
                '\n' => {
                    self.col = 1;
                    self.line += 1;
                }
                _ => break,
            }
            self.iter.next();
        }
    }

    fn symbol(&mut self, col: u32, start: usize, len: usize) -> Token {
        for _ in 0..len {
            self.iter.next();
        }
        self.col += len as u32;
        Token(TokenKind::Symbol, self.span(col, start, start + len))
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_ws();

        let (start, chr) = self.peek();
        let col = self.col;

        match chr {
            // grouping characters
            '(' | ')' | '[' | ']' |
            // arith operator
            '+' | '-' | '*' | '/' | '%' |
            // separators
            ',' | '.' => Ok(self.symbol(col, start, 1)),
            // < <= > >=
            '<' | '>' => {
                let len = if self.peekahead(1).1 == '=' { 2 } else { 1 };
                Ok(self.symbol(col, start, len))
            }
            '=' if self.peekahead(1).1 == '=' => Ok(self.symbol(col, start, 2)),
            '=' => Err(self.error(col, start, "unexpected '=', did you mean '=='?")),
            '!' => {
                let len = if self.peekahead(1).1 == '=' { 2 } else { 1 };
                Ok(self.symbol(col, start, len))
            }
            '&' if self.peekahead(1).1 == '&' => Ok(self.symbol(col, start, 2)),
            '|' if self.peekahead(1).1 == '|' => Ok(self.symbol(col, start, 2)),
            '"' => self.read_string(),
            '\x00' if start >= self.source.len() => {
                Ok(Token(TokenKind::Eof, self.span(col, start, start)))
            }
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_alphabetic() || chr == '_' => Ok(self.read_ident()),
            _ => Err(self.error(col, start, "invalid character")),
        }
    }
}
