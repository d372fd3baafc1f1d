//! Namespace-aware decoder
//!
//! Turns raw [`Token`]s into [`XmlEvent`]s:
//! - translates `prefix:local` names to (namespace URI, local)
//! - emits a start and an end event for `<a/>`
//! - checks end tags against the open element stack
//! - reports text and CDATA both as `CharData`
//!
//! In tolerant mode (`strict = false`) it also closes the elements listed in
//! `auto_close` implicitly and repairs mismatched end tags.

use super::events::{Attr, Name, XmlEvent};
use crate::core::cached_reader::CachedReader;
use crate::core::tokenizer::{Token, Tokenizer};
use crate::dom::namespace::NamespaceResolver;
use crate::error::Result;
use std::collections::{HashMap, VecDeque};
use std::io::BufRead;

/// Tokenizer-level settings, passed through from `ParserOptions`.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// Reject malformed input. Also controls unresolved-namespace errors in
    /// the tree builder.
    pub strict: bool,
    /// Element names (case-insensitive) closed implicitly in tolerant mode,
    /// e.g. `br`, `img`.
    pub auto_close: Vec<String>,
    /// Extra named entities, `nbsp` -> `"\u{a0}"`
    pub entity: HashMap<String, String>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            strict: true,
            auto_close: Vec::new(),
            entity: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct OpenElement {
    raw: String,
    name: Name,
}

#[derive(Debug)]
enum Pending {
    /// Close the innermost open element
    Close,
    /// A token read ahead while deciding on an implicit close
    Token(Token),
}

pub struct Decoder<R> {
    tokenizer: Tokenizer<R>,
    strict: bool,
    auto_close: Vec<String>,
    stack: Vec<OpenElement>,
    namespaces: NamespaceResolver,
    pending: VecDeque<Pending>,
}

impl<R: BufRead> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecoderOptions::default())
    }

    pub fn with_options(reader: R, options: DecoderOptions) -> Self {
        let mut tokenizer = Tokenizer::new(reader);
        tokenizer.set_strict(options.strict);
        tokenizer.set_entities(options.entity);
        Decoder {
            tokenizer,
            strict: options.strict,
            auto_close: options.auto_close,
            stack: Vec::new(),
            namespaces: NamespaceResolver::new(),
            pending: VecDeque::new(),
        }
    }

    /// The lookahead cache under the tokenizer
    pub fn cache(&self) -> &CachedReader<R> {
        self.tokenizer.reader()
    }

    pub fn cache_mut(&mut self) -> &mut CachedReader<R> {
        self.tokenizer.reader_mut()
    }

    /// Next event, `Ok(None)` at end of input.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        loop {
            let token = match self.pending.pop_front() {
                Some(Pending::Close) => return Ok(self.close_element()),
                Some(Pending::Token(token)) => token,
                None => match self.tokenizer.next_token()? {
                    Some(token) => token,
                    None => {
                        if !self.stack.is_empty() {
                            return Err(self.tokenizer.syntax_error("unexpected EOF"));
                        }
                        return Ok(None);
                    }
                },
            };

            if let Some(close) = self.auto_close_before(&token) {
                self.pending.push_back(Pending::Token(token));
                return Ok(Some(close));
            }

            match token {
                Token::StartTag {
                    name,
                    attributes,
                    empty,
                } => {
                    let event = self.open_element(name, attributes);
                    if empty {
                        self.pending.push_back(Pending::Close);
                    }
                    return Ok(Some(event));
                }
                Token::EndTag { name } => {
                    if let Some(event) = self.end_element(&name)? {
                        return Ok(Some(event));
                    }
                }
                Token::Text(text) | Token::CData(text) => return Ok(Some(XmlEvent::CharData(text))),
                Token::Comment(text) => return Ok(Some(XmlEvent::Comment(text))),
                Token::ProcessingInstruction { target, inst } => {
                    return Ok(Some(XmlEvent::ProcInst { target, inst }))
                }
                Token::Directive(text) => return Ok(Some(XmlEvent::Directive(text))),
            }
        }
    }

    fn open_element(&mut self, raw: String, attributes: Vec<(String, String)>) -> XmlEvent {
        self.namespaces.push_scope();
        for (key, value) in &attributes {
            if key == "xmlns" {
                self.namespaces.declare_default(value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.declare(prefix, value);
            }
        }

        let name = self.translate(Name::parse(&raw), true);
        let attributes = attributes
            .into_iter()
            .map(|(key, value)| Attr {
                name: self.translate(Name::parse(&key), false),
                value,
            })
            .collect();

        self.stack.push(OpenElement {
            raw,
            name: name.clone(),
        });
        XmlEvent::StartElement { name, attributes }
    }

    fn close_element(&mut self) -> Option<XmlEvent> {
        let open = self.stack.pop()?;
        self.namespaces.pop_scope();
        Some(XmlEvent::EndElement { name: open.name })
    }

    fn end_element(&mut self, raw: &str) -> Result<Option<XmlEvent>> {
        let Some(top) = self.stack.last() else {
            if self.strict {
                return Err(self
                    .tokenizer
                    .syntax_error(format!("unexpected end element </{}>", raw)));
            }
            return Ok(None);
        };
        if top.raw == raw {
            return Ok(self.close_element());
        }
        if self.strict {
            return Err(self.tokenizer.syntax_error(format!(
                "element <{}> closed by </{}>",
                top.raw, raw
            )));
        }

        // Tolerant: close everything down to the matching element, or drop
        // the stray end tag.
        let Some(index) = self.stack.iter().rposition(|e| e.raw == raw) else {
            return Ok(None);
        };
        let extra = self.stack.len() - index - 1;
        for _ in 0..extra {
            self.pending.push_back(Pending::Close);
        }
        Ok(self.close_element())
    }

    /// In tolerant mode, an open auto-close element is closed before any
    /// token that is not its own end tag.
    fn auto_close_before(&mut self, token: &Token) -> Option<XmlEvent> {
        if self.strict || self.auto_close.is_empty() {
            return None;
        }
        let top = self.stack.last()?;
        let local = &top.name.local;
        if !self.auto_close.iter().any(|s| s.eq_ignore_ascii_case(local)) {
            return None;
        }
        if let Token::EndTag { name } = token {
            if Name::parse(name).local.eq_ignore_ascii_case(local) {
                return None;
            }
        }
        self.close_element()
    }

    fn translate(&self, mut name: Name, is_element: bool) -> Name {
        if name.space == "xmlns" || (name.space.is_empty() && name.local == "xmlns") {
            return name;
        }
        if name.space.is_empty() {
            if is_element {
                if let Some(uri) = self.namespaces.resolve_default() {
                    name.space = uri.to_string();
                }
            }
            return name;
        }
        if let Some(uri) = self.namespaces.resolve(&name.space) {
            name.space = uri.to_string();
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn events_with(input: &str, options: DecoderOptions) -> Result<Vec<XmlEvent>> {
        let mut d = Decoder::with_options(Cursor::new(input.as_bytes().to_vec()), options);
        let mut out = Vec::new();
        while let Some(ev) = d.next_event()? {
            out.push(ev);
        }
        Ok(out)
    }

    fn events(input: &str) -> Vec<XmlEvent> {
        events_with(input, DecoderOptions::default()).unwrap()
    }

    fn start(space: &str, local: &str) -> XmlEvent {
        XmlEvent::StartElement {
            name: Name::new(space, local),
            attributes: vec![],
        }
    }

    fn end(space: &str, local: &str) -> XmlEvent {
        XmlEvent::EndElement {
            name: Name::new(space, local),
        }
    }

    #[test]
    fn test_empty_tag_emits_start_and_end() {
        assert_eq!(events("<a/>"), vec![start("", "a"), end("", "a")]);
    }

    #[test]
    fn test_namespace_translation() {
        let evs = events(r#"<bk:a xmlns:bk="urn:b" xmlns="urn:d" bk:x="1" y="2"><c/></bk:a>"#);
        match &evs[0] {
            XmlEvent::StartElement { name, attributes } => {
                assert_eq!(name, &Name::new("urn:b", "a"));
                assert_eq!(attributes[0].name, Name::new("xmlns", "bk"));
                assert_eq!(attributes[1].name, Name::new("", "xmlns"));
                assert_eq!(attributes[2].name, Name::new("urn:b", "x"));
                assert_eq!(attributes[3].name, Name::new("", "y"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(evs[1], start("urn:d", "c"));
        assert_eq!(evs[3], end("urn:b", "a"));
    }

    #[test]
    fn test_unbound_prefix_kept_literal() {
        assert_eq!(events("<p:a/>")[0], start("p", "a"));
    }

    #[test]
    fn test_xml_prefix() {
        match &events(r#"<a xml:space="preserve"/>"#)[0] {
            XmlEvent::StartElement { attributes, .. } => {
                assert_eq!(
                    attributes[0].name,
                    Name::new(crate::dom::namespace::ns::XML, "space")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cdata_reported_as_char_data() {
        assert_eq!(
            events("<a><![CDATA[x]]>y</a>")[1..3],
            [XmlEvent::CharData("x".into()), XmlEvent::CharData("y".into())]
        );
    }

    #[test]
    fn test_strict_errors() {
        let err = events_with("<a></b>", DecoderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("element <a> closed by </b>"));
        let err = events_with("<a><b></b>", DecoderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unexpected EOF"));
        let err = events_with("</a>", DecoderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unexpected end element"));
    }

    #[test]
    fn test_tolerant_repairs_end_tags() {
        let options = DecoderOptions {
            strict: false,
            ..Default::default()
        };
        let evs = events_with("<a><b><c></a></x>", options).unwrap();
        assert_eq!(
            evs,
            vec![
                start("", "a"),
                start("", "b"),
                start("", "c"),
                end("", "c"),
                end("", "b"),
                end("", "a"),
            ]
        );
    }

    #[test]
    fn test_auto_close() {
        let options = DecoderOptions {
            strict: false,
            auto_close: vec!["br".to_string()],
            ..Default::default()
        };
        let evs = events_with("<p>a<br>b</p>", options).unwrap();
        assert_eq!(
            evs,
            vec![
                start("", "p"),
                XmlEvent::CharData("a".into()),
                start("", "br"),
                end("", "br"),
                XmlEvent::CharData("b".into()),
                end("", "p"),
            ]
        );
    }
}
