//! XML Node representation
//!
//! Uses NodeId (u32) for compact node references into the document arena.
//! Structural links are only changed through [`super::XmlDocument`], which
//! keeps parent/child/sibling links consistent.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root
    Document,
    /// `<?xml ...?>`
    Declaration,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CharData,
    /// Comment
    Comment,
    /// Processing instruction other than the declaration
    ProcessingInstruction,
    /// `<!DOCTYPE ...>` and other directives
    Notation,
    /// Attribute. Never stored in the arena; XPath reports attributes with
    /// this kind.
    Attribute,
}

/// A name as written: optional prefix plus local part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: String,
    pub local: String,
}

impl QName {
    pub fn new(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        QName {
            prefix: prefix.into(),
            local: local.into(),
        }
    }

    /// Split `prefix:local` on the first colon (a leading colon is kept).
    pub fn parse(key: &str) -> Self {
        match key.find(':') {
            Some(i) if i > 0 => QName::new(&key[..i], &key[i + 1..]),
            _ => QName::new("", key),
        }
    }

    /// `prefix:local`, or `local` without a prefix
    pub fn qualified(&self) -> String {
        if self.prefix.is_empty() {
            self.local.clone()
        } else {
            format!("{}:{}", self.prefix, self.local)
        }
    }
}

/// Element attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Prefix as bound in the source (or the namespace URI when unbound)
    pub name: QName,
    pub value: String,
    /// Resolved namespace URI, empty for unprefixed attributes
    pub namespace_uri: String,
}

/// Target and instruction of a processing instruction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcInst {
    pub target: String,
    pub inst: String,
}

/// An XML node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Type of this node
    pub kind: NodeKind,
    /// Element local name, text/comment content, PI target, directive body
    pub data: String,
    /// Prefix written in the source for elements
    pub prefix: String,
    pub namespace_uri: String,
    /// Attributes in document order (elements, declarations, PIs)
    pub attributes: Vec<XmlAttribute>,
    pub proc_inst: Option<ProcInst>,
    /// Nesting depth at construction time; top-level nodes are 1
    pub level: u32,
    /// 1-based source line, set by line-number annotation
    pub line_number: usize,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
}

impl XmlNode {
    /// Create a detached node of the given kind
    pub fn new(kind: NodeKind, data: impl Into<String>) -> Self {
        XmlNode {
            kind,
            data: data.into(),
            prefix: String::new(),
            namespace_uri: String::new(),
            attributes: Vec::new(),
            proc_inst: None,
            level: 0,
            line_number: 0,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    pub fn document() -> Self {
        Self::new(NodeKind::Document, "")
    }

    pub fn element(local: impl Into<String>) -> Self {
        Self::new(NodeKind::Element, local)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Text, content)
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Text or CDATA
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CharData)
    }

    /// `prefix:local` for elements, `data` otherwise
    pub fn name(&self) -> String {
        if self.prefix.is_empty() {
            self.data.clone()
        } else {
            format!("{}:{}", self.prefix, self.data)
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    /// Attribute value by `prefix:local` (or bare local) name
    pub fn attr(&self, name: &str) -> Option<&str> {
        let wanted = QName::parse(name);
        self.attributes
            .iter()
            .find(|a| a.name == wanted)
            .map(|a| a.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_parse() {
        assert_eq!(QName::parse("xml:space"), QName::new("xml", "space"));
        assert_eq!(QName::parse("id"), QName::new("", "id"));
        assert_eq!(QName::parse(":odd"), QName::new("", ":odd"));
        assert_eq!(QName::new("bk", "title").qualified(), "bk:title");
    }

    #[test]
    fn test_node_name_and_attr() {
        let mut node = XmlNode::element("creator");
        node.prefix = "dc".to_string();
        node.attributes.push(XmlAttribute {
            name: QName::new("xml", "lang"),
            value: "en".to_string(),
            namespace_uri: super::super::namespace::ns::XML.to_string(),
        });
        assert_eq!(node.name(), "dc:creator");
        assert_eq!(node.attr("xml:lang"), Some("en"));
        assert_eq!(node.attr("lang"), None);
        assert!(node.is_element());
        assert!(!node.is_text());
    }
}
