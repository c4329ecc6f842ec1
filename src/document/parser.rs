//! Document parser
//!
//! Recursive-descent parser over a character cursor. It reads the JSON-like
//! text used by the metadata and label files:
//!
//! - a root starting with `[` is an array, anything else is an object (the
//!   surrounding braces of the root object are optional)
//! - values are objects, arrays or double-quoted strings; there are no bare
//!   number, boolean or null literals, so every scalar is a string
//! - keys may be quoted or bare (`[A-Za-z0-9_$-]+`)
//! - whitespace (including newlines) between tokens is insignificant, and
//!   trailing commas are tolerated

use std::path::Path;

use crate::document::{Document, DocumentMap};
use crate::error::{EngineError, Result};

const MAX_DEPTH: usize = 128;

/// Parse document text.
///
/// Every object in the resulting tree gets the `case_sensitive` key rule.
pub fn parse(text: &str, case_sensitive: bool) -> Result<Document> {
    let mut parser = Parser::new(text, case_sensitive);
    parser.parse_root()
}

/// Read and parse a document file. An empty file yields `Document::Null`.
pub fn parse_file(path: impl AsRef<Path>, case_sensitive: bool) -> Result<Document> {
    let text = std::fs::read_to_string(path.as_ref())?;
    if text.trim().is_empty() {
        return Ok(Document::Null);
    }
    parse(&text, case_sensitive)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    case_sensitive: bool,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, case_sensitive: bool) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
            case_sensitive,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, msg: impl std::fmt::Display) -> EngineError {
        EngineError::malformed(format!("{} at offset {}", msg, self.pos))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn parse_root(&mut self) -> Result<Document> {
        self.skip_whitespace();
        let doc = match self.peek() {
            None => return Err(self.error("empty document")),
            Some('[') => self.parse_array()?,
            Some('{') => self.parse_object()?,
            Some(_) => Document::Object(self.parse_members(None)?),
        };

        self.skip_whitespace();
        if let Some(c) = self.peek() {
            return Err(self.error(format!("unexpected trailing character '{}'", c)));
        }
        Ok(doc)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("document nested too deeply"));
        }
        Ok(())
    }

    fn parse_value(&mut self) -> Result<Document> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.parse_array(),
            Some('{') => self.parse_object(),
            Some('"') => Ok(Document::String(self.parse_string()?)),
            Some(c) => Err(self.error(format!(
                "unexpected character '{}'; values must be objects, arrays or quoted strings",
                c
            ))),
            None => Err(self.error("expected a value, found end of input")),
        }
    }

    fn parse_object(&mut self) -> Result<Document> {
        self.enter()?;
        self.expect('{')?;
        let members = self.parse_members(Some('}'))?;
        self.expect('}')?;
        self.depth -= 1;
        Ok(Document::Object(members))
    }

    /// Parse `key: value` pairs up to `close` (or end of input for a bare root)
    fn parse_members(&mut self, close: Option<char>) -> Result<DocumentMap> {
        let mut map = DocumentMap::with_case_sensitivity(self.case_sensitive);

        loop {
            self.skip_whitespace();
            match (self.peek(), close) {
                (None, None) => break,
                (None, Some(c)) => {
                    return Err(self.error(format!("unterminated object, expected '{}'", c)));
                }
                (Some(c), Some(end)) if c == end => break,
                _ => {}
            }

            let key = self.parse_key()?;
            self.skip_whitespace();
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if Some(c) == close => break,
                None if close.is_none() => break,
                Some(c) => return Err(self.error(format!("expected ',' between members, found '{}'", c))),
                None => return Err(self.error("unterminated object")),
            }
        }

        Ok(map)
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.peek() {
            Some('"') => self.parse_string(),
            Some(c) if is_bare_key_char(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_bare_key_char) {
                    self.bump();
                }
                Ok(self.src[start..self.pos].to_string())
            }
            Some(c) => Err(self.error(format!("unexpected character '{}' where a key was expected", c))),
            None => Err(self.error("expected a key, found end of input")),
        }
    }

    fn parse_array(&mut self) -> Result<Document> {
        self.enter()?;
        self.expect('[')?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                break;
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => break,
                Some(c) => return Err(self.error(format!("expected ',' between items, found '{}'", c))),
                None => return Err(self.error("unterminated array")),
            }
        }

        self.expect(']')?;
        self.depth -= 1;
        Ok(Document::Array(items))
    }

    fn parse_string(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut out = String::new();

        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => self.parse_escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<()> {
        match self.bump() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let high = self.parse_hex4()?;
                let code = if (0xD800..0xDC00).contains(&high) && self.src[self.pos..].starts_with("\\u") {
                    self.pos += 2;
                    let low = self.parse_hex4()?;
                    0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF)
                } else {
                    high
                };
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            // Unknown escapes are kept verbatim
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => return Err(self.error("unterminated escape sequence")),
        }
        Ok(())
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let digits = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| self.error(format!("invalid unicode escape '{}'", digits)))?;
        self.pos = end;
        Ok(code)
    }
}

fn is_bare_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}
