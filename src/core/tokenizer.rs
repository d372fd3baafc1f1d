//! XML Tokenizer - byte-level pull tokenizer over a [`CachedReader`]
//!
//! Extracts raw XML tokens from a byte stream:
//! - Element start/end tags (with attributes, empty-tag flag)
//! - Text content (entity references decoded)
//! - CDATA sections
//! - Comments
//! - Processing instructions
//! - Directives (`<!DOCTYPE ...>` and friends), kept verbatim
//!
//! The tokenizer keeps one byte of pushback. Markup tokens always read their
//! leading `<` themselves, so a capture started before a token includes it.
//! Namespace handling lives one layer up in [`crate::reader::Decoder`].

use super::cached_reader::CachedReader;
use super::entities::{decode_entities, normalize_newlines};
use crate::error::{Error, ParseError, Result};
use std::collections::HashMap;
use std::io::BufRead;

/// A raw token. Names are as written (`prefix:local`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<name attr="v">` or `<name/>` when `empty` is set
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        empty: bool,
    },
    /// `</name>`
    EndTag { name: String },
    Text(String),
    CData(String),
    Comment(String),
    /// `<?target inst?>`, leading whitespace of `inst` skipped
    ProcessingInstruction { target: String, inst: String },
    /// Content between `<!` and `>`
    Directive(String),
}

pub struct Tokenizer<R> {
    reader: CachedReader<R>,
    pushback: Option<u8>,
    strict: bool,
    entities: HashMap<String, String>,
    line: usize,
    offset: usize,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Tokenizer {
            reader: CachedReader::new(reader),
            pushback: None,
            strict: true,
            entities: HashMap::new(),
            line: 1,
            offset: 0,
        }
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn set_entities(&mut self, entities: HashMap<String, String>) {
        self.entities = entities;
    }

    pub fn reader(&self) -> &CachedReader<R> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut CachedReader<R> {
        &mut self.reader
    }

    pub(crate) fn syntax_error(&self, message: impl Into<String>) -> Error {
        Error::Syntax(ParseError {
            message: message.into(),
            line: self.line,
            position: self.offset,
        })
    }

    /// Next token, `Ok(None)` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        let Some(b) = self.getc()? else {
            return Ok(None);
        };
        if b != b'<' {
            self.ungetc(b);
            return self.parse_text().map(Some);
        }

        match self.must_getc()? {
            b'/' => self.parse_end_tag().map(Some),
            b'?' => self.parse_pi().map(Some),
            b'!' => self.parse_bang_markup().map(Some),
            b => {
                self.ungetc(b);
                self.parse_start_tag().map(Some)
            }
        }
    }

    fn parse_text(&mut self) -> Result<Token> {
        let mut raw = Vec::new();
        self.read_run(b"<", &mut raw)?;
        let raw = normalize_newlines(&raw);
        let text = decode_entities(&raw, &self.entities, self.strict)
            .map_err(|msg| self.syntax_error(msg))?;
        Ok(Token::Text(self.utf8(text.into_owned())?))
    }

    fn parse_start_tag(&mut self) -> Result<Token> {
        let Some(name) = self.name()? else {
            return Err(self.syntax_error("expected element name after <"));
        };

        let mut attributes = Vec::new();
        let mut empty = false;
        loop {
            self.space()?;
            let b = self.must_getc()?;
            if b == b'/' {
                if self.must_getc()? != b'>' {
                    return Err(self.syntax_error(format!("expected /> in element <{}>", name)));
                }
                empty = true;
                break;
            }
            if b == b'>' {
                break;
            }
            self.ungetc(b);

            let Some(attr_name) = self.name()? else {
                return Err(self.syntax_error(format!(
                    "expected attribute name in element <{}>",
                    name
                )));
            };
            self.space()?;
            let b = self.must_getc()?;
            if b != b'=' {
                if self.strict {
                    return Err(self.syntax_error(format!(
                        "attribute name without = in element <{}>",
                        name
                    )));
                }
                self.ungetc(b);
                let value = attr_name.clone();
                attributes.push((attr_name, value));
                continue;
            }
            self.space()?;
            let value = self.attr_value(&name)?;
            attributes.push((attr_name, value));
        }

        Ok(Token::StartTag {
            name,
            attributes,
            empty,
        })
    }

    fn attr_value(&mut self, element: &str) -> Result<String> {
        let b = self.must_getc()?;
        let mut raw = Vec::new();
        if b == b'"' || b == b'\'' {
            self.read_run(&[b], &mut raw)?;
            self.must_getc()?;
            if self.strict && memchr::memchr(b'<', &raw).is_some() {
                return Err(self.syntax_error("unescaped < inside quoted string"));
            }
        } else {
            if self.strict {
                return Err(self.syntax_error(format!(
                    "unquoted or missing attribute value in element <{}>",
                    element
                )));
            }
            self.ungetc(b);
            while let Some(b) = self.getc()? {
                if b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'-') {
                    raw.push(b);
                } else {
                    self.ungetc(b);
                    break;
                }
            }
        }
        let raw = normalize_newlines(&raw);
        let value = decode_entities(&raw, &self.entities, self.strict)
            .map_err(|msg| self.syntax_error(msg))?;
        self.utf8(value.into_owned())
    }

    fn parse_end_tag(&mut self) -> Result<Token> {
        let Some(name) = self.name()? else {
            return Err(self.syntax_error("expected element name after </"));
        };
        self.space()?;
        if self.must_getc()? != b'>' {
            return Err(self.syntax_error(format!(
                "invalid characters between </{} and >",
                name
            )));
        }
        Ok(Token::EndTag { name })
    }

    fn parse_pi(&mut self) -> Result<Token> {
        let Some(target) = self.name()? else {
            return Err(self.syntax_error("expected target name after <?"));
        };

        let mut content = Vec::new();
        let mut prev = 0u8;
        loop {
            let b = self.must_getc()?;
            if prev == b'?' && b == b'>' {
                break;
            }
            content.push(b);
            prev = b;
        }
        // drop the '?' of "?>"
        content.pop();

        let start = content
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(content.len());
        let inst = self.utf8(content[start..].to_vec())?;

        if target == "xml" {
            self.check_declaration(&inst)?;
        }
        Ok(Token::ProcessingInstruction { target, inst })
    }

    fn check_declaration(&self, inst: &str) -> Result<()> {
        if let Some(version) = pseudo_attr(inst, "version") {
            if version != "1.0" {
                return Err(self.syntax_error(format!(
                    "unsupported version {:?}; only version 1.0 is supported",
                    version
                )));
            }
        }
        if let Some(encoding) = pseudo_attr(inst, "encoding") {
            let supported = ["utf-8", "utf8", "us-ascii", "ascii"]
                .iter()
                .any(|label| encoding.eq_ignore_ascii_case(label));
            if !supported {
                if self.strict {
                    return Err(self.syntax_error(format!(
                        "encoding {:?} declared but only UTF-8 input is supported",
                        encoding
                    )));
                }
                tracing::warn!(encoding, "treating declared encoding as UTF-8");
            }
        }
        Ok(())
    }

    fn parse_bang_markup(&mut self) -> Result<Token> {
        match self.must_getc()? {
            b'-' => {
                if self.must_getc()? != b'-' {
                    return Err(self.syntax_error("invalid sequence <!- not part of <!--"));
                }
                let mut content = Vec::new();
                let (mut b0, mut b1) = (0u8, 0u8);
                loop {
                    let b = self.must_getc()?;
                    if b0 == b'-' && b1 == b'-' {
                        if b == b'>' {
                            break;
                        }
                        if self.strict {
                            return Err(self.syntax_error(
                                "invalid sequence \"--\" not allowed in comments",
                            ));
                        }
                    }
                    content.push(b);
                    b0 = b1;
                    b1 = b;
                }
                content.truncate(content.len().saturating_sub(2));
                Ok(Token::Comment(self.utf8(content)?))
            }
            b'[' => {
                for &expected in b"CDATA[" {
                    if self.must_getc()? != expected {
                        return Err(self.syntax_error("invalid <![ sequence"));
                    }
                }
                let mut content = Vec::new();
                loop {
                    content.push(self.must_getc()?);
                    if content.ends_with(b"]]>") {
                        break;
                    }
                }
                content.truncate(content.len() - 3);
                let content = normalize_newlines(&content).into_owned();
                Ok(Token::CData(self.utf8(content)?))
            }
            b => {
                self.ungetc(b);
                self.parse_directive()
            }
        }
    }

    /// `<!DOCTYPE ...>` and other declarations. Nested `<...>` pairs and
    /// quoted strings are skipped over; embedded comments become a space.
    fn parse_directive(&mut self) -> Result<Token> {
        let mut content = Vec::new();
        let mut quote = 0u8;
        let mut depth = 0usize;
        let mut replay: Option<u8> = None;

        loop {
            let b = match replay.take() {
                Some(b) => b,
                None => {
                    let b = self.must_getc()?;
                    if quote == 0 && b == b'>' && depth == 0 {
                        break;
                    }
                    b
                }
            };
            content.push(b);

            if quote != 0 {
                if b == quote {
                    quote = 0;
                }
                continue;
            }
            match b {
                b'\'' | b'"' => quote = b,
                b'>' => depth = depth.saturating_sub(1),
                b'<' => {
                    let mut matched = 0;
                    for &expected in b"!--" {
                        let next = self.must_getc()?;
                        if next != expected {
                            content.extend_from_slice(&b"!--"[..matched]);
                            depth += 1;
                            replay = Some(next);
                            break;
                        }
                        matched += 1;
                    }
                    if matched < 3 {
                        continue;
                    }
                    // Drop the '<' and skip the comment body.
                    content.pop();
                    let (mut b0, mut b1) = (0u8, 0u8);
                    loop {
                        let b = self.must_getc()?;
                        if b0 == b'-' && b1 == b'-' {
                            if b != b'>' {
                                return Err(self.syntax_error(
                                    "invalid sequence \"--\" not allowed in comments",
                                ));
                            }
                            break;
                        }
                        b0 = b1;
                        b1 = b;
                    }
                    content.push(b' ');
                }
                _ => {}
            }
        }

        Ok(Token::Directive(self.utf8(content)?))
    }

    // ---- byte level ----

    fn getc(&mut self) -> Result<Option<u8>> {
        let b = match self.pushback.take() {
            Some(b) => Some(b),
            None => self.reader.read_byte()?,
        };
        if let Some(b) = b {
            self.offset += 1;
            if b == b'\n' {
                self.line += 1;
            }
        }
        Ok(b)
    }

    fn must_getc(&mut self) -> Result<u8> {
        match self.getc()? {
            Some(b) => Ok(b),
            None => Err(self.syntax_error("unexpected EOF")),
        }
    }

    fn ungetc(&mut self, b: u8) {
        self.offset -= 1;
        if b == b'\n' {
            self.line -= 1;
        }
        self.pushback = Some(b);
    }

    /// Append bytes up to (not including) the first byte in `stops`.
    fn read_run(&mut self, stops: &[u8], out: &mut Vec<u8>) -> Result<()> {
        if let Some(b) = self.pushback {
            if stops.contains(&b) {
                return Ok(());
            }
            self.getc()?;
            out.push(b);
        }
        let start = out.len();
        self.reader.read_until_any(stops, out)?;
        let run = &out[start..];
        self.offset += run.len();
        self.line += memchr::memchr_iter(b'\n', run).count();
        Ok(())
    }

    fn space(&mut self) -> Result<()> {
        while let Some(b) = self.getc()? {
            if !matches!(b, b' ' | b'\r' | b'\n' | b'\t') {
                self.ungetc(b);
                break;
            }
        }
        Ok(())
    }

    fn name(&mut self) -> Result<Option<String>> {
        let Some(first) = self.getc()? else {
            return Ok(None);
        };
        if !is_name_start_char(first) {
            self.ungetc(first);
            return Ok(None);
        }
        let mut name = vec![first];
        while let Some(b) = self.getc()? {
            if is_name_char(b) {
                name.push(b);
            } else {
                self.ungetc(b);
                break;
            }
        }
        self.utf8(name).map(Some)
    }

    fn utf8(&self, bytes: Vec<u8>) -> Result<String> {
        String::from_utf8(bytes).map_err(|_| self.syntax_error("invalid UTF-8"))
    }
}

/// Check if byte can start an XML name
#[inline]
pub fn is_name_start_char(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b':' || c >= 0x80
}

/// Check if byte can continue an XML name
#[inline]
pub fn is_name_char(c: u8) -> bool {
    is_name_start_char(c) || c.is_ascii_digit() || c == b'-' || c == b'.'
}

/// Value of a `name="value"` pseudo-attribute inside a processing instruction.
pub fn pseudo_attr<'a>(inst: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = inst;
    loop {
        rest = rest.trim_start();
        let eq = rest.find('=')?;
        let key = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let close = after[1..].find(quote)?;
        if key == name {
            return Some(&after[1..1 + close]);
        }
        rest = &after[close + 2..];
    }
}
