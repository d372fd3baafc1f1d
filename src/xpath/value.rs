//! XPath Value Types
//!
//! XPath 1.0 has four data types: node-set, boolean, number, and string.
//! Attributes are not arena nodes, so node-set items are [`XPathNode`]s.

use crate::dom::NodeId;

/// An item of a node-set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XPathNode {
    /// A node stored in the arena
    Node(NodeId),
    /// The `index`-th attribute of element `owner`
    Attribute(NodeId, usize),
}

impl XPathNode {
    /// The arena node: the node itself, or the attribute's owner element
    pub fn node_id(&self) -> NodeId {
        match *self {
            XPathNode::Node(id) | XPathNode::Attribute(id, _) => id,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, XPathNode::Attribute(..))
    }
}

/// XPath value types
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum XPathValue {
    /// A set of nodes in document order, no duplicates
    NodeSet(Vec<XPathNode>),
    Boolean(bool),
    Number(f64),
    String(String),
}

impl XPathValue {
    pub fn empty_nodeset() -> Self {
        XPathValue::NodeSet(Vec::new())
    }

    pub fn single_node(node: XPathNode) -> Self {
        XPathValue::NodeSet(vec![node])
    }

    /// boolean() semantics
    pub fn to_boolean(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::Boolean(b) => *b,
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::String(s) => !s.is_empty(),
        }
    }

    pub fn is_nodeset(&self) -> bool {
        matches!(self, XPathValue::NodeSet(_))
    }

    pub fn as_nodeset(&self) -> Option<&[XPathNode]> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn into_nodeset(self) -> Option<Vec<XPathNode>> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }
}

impl Default for XPathValue {
    fn default() -> Self {
        XPathValue::NodeSet(Vec::new())
    }
}

impl From<bool> for XPathValue {
    fn from(b: bool) -> Self {
        XPathValue::Boolean(b)
    }
}

impl From<f64> for XPathValue {
    fn from(n: f64) -> Self {
        XPathValue::Number(n)
    }
}

impl From<String> for XPathValue {
    fn from(s: String) -> Self {
        XPathValue::String(s)
    }
}

impl From<&str> for XPathValue {
    fn from(s: &str) -> Self {
        XPathValue::String(s.to_string())
    }
}

/// number() applied to a string. Only an optional minus sign, digits and
/// one decimal point are accepted; anything else is NaN.
pub fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    let digits = s.strip_prefix('-').unwrap_or(s);
    let valid = !digits.is_empty()
        && digits != "."
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1;
    if valid {
        s.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// string() applied to a number
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
