//! XML Event Types
//!
//! Namespace-translated events produced by [`super::Decoder`].

/// An expanded name. After translation `space` holds the namespace URI,
/// or the literal prefix when the prefix has no binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    pub space: String,
    pub local: String,
}

impl Name {
    pub fn new(space: impl Into<String>, local: impl Into<String>) -> Self {
        Name {
            space: space.into(),
            local: local.into(),
        }
    }

    /// Split a raw `prefix:local` name on its first colon.
    pub fn parse(raw: &str) -> Self {
        match raw.find(':') {
            Some(i) if i > 0 && i + 1 < raw.len() => Name::new(&raw[..i], &raw[i + 1..]),
            _ => Name::new("", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: Name,
    pub value: String,
}

/// XML parsing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Start of an element. `<a/>` produces a start followed by an end.
    StartElement { name: Name, attributes: Vec<Attr> },
    EndElement { name: Name },
    /// Text content or CDATA section content; the two are not distinguished.
    CharData(String),
    Comment(String),
    ProcInst { target: String, inst: String },
    /// Content of `<!...>`
    Directive(String),
}
