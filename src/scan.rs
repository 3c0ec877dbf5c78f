use lazy_static::lazy_static;
use miette::Report;
use regex::Regex;

use crate::error;
use crate::span::{Idx, Span};

lazy_static! {
    static ref IDENT: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9]*$").unwrap();
    static ref INTEGER: Regex = Regex::new(r"^[+-]?[0-9]+$").unwrap();
}

pub fn is_ident_shaped(text: &str) -> bool {
    IDENT.is_match(text)
}

pub fn is_integer_shaped(text: &str) -> bool {
    INTEGER.is_match(text)
}

/// Parses a signed decimal literal. Shape errors and overflow report separately
/// so the help text can point at the right fix.
pub fn parse_int(text: &str, span: Span, src: &'static str) -> Result<i64, Report> {
    if !is_integer_shaped(text) {
        return Err(error::parse_not_integer(span, src));
    }
    text.parse::<i64>()
        .map_err(|e| error::parse_bad_literal(span, src, e))
}

/// Iterates `(byte_offset, line)` pairs over a whole source. Terminators are
/// excluded, `\r` before a line break is dropped, and a trailing newline does
/// not produce a final empty line.
pub fn lines_with_offsets(src: &str) -> impl Iterator<Item = (u32, &str)> + '_ {
    let total = src.len();
    src.split('\n').scan(0u32, move |offs, raw| {
        let base = *offs;
        *offs += raw.len() as u32 + 1;
        if base as usize == total && raw.is_empty() {
            return None;
        }
        Some((base, raw.strip_suffix('\r').unwrap_or(raw)))
    })
}

/// Cursor over a single source line. Tokens end at whitespace, `,` and `:`;
/// commas are counted while crossing separator runs so each call site can
/// state exactly how many it expects.
pub struct LineScanner<'a> {
    line: &'a str,
    /// Byte offset of the line within the file, for span construction.
    base: u32,
    pos: usize,
    src: &'static str,
}

impl<'a> LineScanner<'a> {
    pub fn new(line: &'a str, base: u32, src: &'static str) -> Self {
        LineScanner {
            line,
            base,
            pos: 0,
            src,
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.line[self.pos..].chars().next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn span_of(&self, start: usize, end: usize) -> Span {
        Span::new(Idx(self.base + start as u32), (end - start) as u16)
    }

    /// Point span at the cursor, for diagnostics with no token to anchor to.
    pub fn span_here(&self) -> Span {
        let len = if self.pos < self.line.len() { 1 } else { 0 };
        Span::new(Idx(self.base + self.pos as u32), len)
    }

    fn word(&mut self) -> Option<(&'a str, Span)> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || c == ':' {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            None
        } else {
            Some((&self.line[start..self.pos], self.span_of(start, self.pos)))
        }
    }

    /// Skips whitespace and grabs the next token with no comma policing.
    pub fn token(&mut self) -> Option<(&'a str, Span)> {
        self.skip_ws();
        self.word()
    }

    /// Crosses one separator run, counting commas. At end of line any comma is
    /// a trailing comma regardless of what was expected.
    pub fn expect_separators(&mut self, expected: u32) -> Result<(), Report> {
        let start = self.pos;
        let mut commas = 0u32;
        while let Some(c) = self.peek() {
            if c == ',' {
                commas += 1;
            } else if !c.is_whitespace() {
                break;
            }
            self.bump();
        }
        let span = if self.pos > start {
            self.span_of(start, self.pos)
        } else {
            self.span_here()
        };
        if self.peek().is_none() {
            if commas == 0 {
                Ok(())
            } else {
                Err(error::parse_trailing_comma(span, self.src))
            }
        } else if commas < expected {
            Err(error::parse_missing_comma(span, self.src))
        } else if commas > expected {
            Err(error::parse_extra_comma(span, self.src))
        } else {
            Ok(())
        }
    }

    /// One comma-disciplined field: validates the separators on both sides of
    /// the token. `Ok(None)` means the line ran out, which callers interpret
    /// as either "missing operand" or "list finished".
    pub fn field(
        &mut self,
        commas_before: u32,
        commas_after: u32,
    ) -> Result<Option<(&'a str, Span)>, Report> {
        self.expect_separators(commas_before)?;
        let word = self.word();
        if word.is_none() {
            return Ok(None);
        }
        self.expect_separators(commas_after)?;
        Ok(word)
    }

    pub fn eat_colon(&mut self) -> bool {
        if self.peek() == Some(':') {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Verifies nothing but whitespace remains on the line.
    pub fn expect_line_end(&mut self, after: &str) -> Result<(), Report> {
        self.skip_ws();
        if self.pos < self.line.len() {
            let span = self.span_of(self.pos, self.line.len());
            return Err(error::parse_extra_text(span, self.src, after));
        }
        Ok(())
    }
}
