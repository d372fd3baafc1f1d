//! DOM Module - Arena-based XML Document
//!
//! Implements a mutable DOM representation using:
//! - Arena allocation for nodes with a free list
//! - NodeId (u32) indices for traversal and structural links
//! - Scoped namespace tables used while building
//! - XML serialization of any subtree

pub mod document;
pub mod namespace;
pub mod node;
pub mod output;

pub use document::XmlDocument;
pub use node::{NodeId, NodeKind, ProcInst, QName, XmlAttribute, XmlNode};
pub use output::OutputOptions;

/// Read access to an arena of nodes. Everything except `get_node` has a
/// default implementation in terms of the node links, so XPath evaluation
/// works over any arena that can hand out nodes.
pub trait DocumentAccess {
    /// Get a node by ID
    fn get_node(&self, id: NodeId) -> Option<&XmlNode>;

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.parent)
    }

    fn first_child_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.first_child)
    }

    fn last_child_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.last_child)
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.next_sibling)
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.prev_sibling)
    }

    /// Get node local name (element local part, PI target)
    fn node_local_name(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        match node.kind {
            NodeKind::Element | NodeKind::ProcessingInstruction => Some(node.data.as_str()),
            _ => None,
        }
    }

    /// Get attributes for an element
    fn attributes(&self, id: NodeId) -> &[XmlAttribute] {
        match self.get_node(id) {
            Some(node) if node.kind == NodeKind::Element => &node.attributes,
            _ => &[],
        }
    }

    /// Iterate over children - returns collected Vec for trait object compatibility
    fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut child = self.first_child_of(id);
        while let Some(c) = child {
            out.push(c);
            child = self.next_sibling_of(c);
        }
        out
    }

    /// Iterate over descendants in document order - returns collected Vec
    fn descendants_vec(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children_vec(id).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children_vec(current).into_iter().rev());
        }
        out
    }

    /// XPath string-value of a node: concatenated descendant text for
    /// documents and elements, own content for the other kinds.
    fn string_value(&self, id: NodeId) -> String {
        let Some(node) = self.get_node(id) else {
            return String::new();
        };
        match node.kind {
            NodeKind::Document | NodeKind::Element => self
                .descendants_vec(id)
                .into_iter()
                .filter_map(|d| self.get_node(d))
                .filter(|n| n.is_text())
                .map(|n| n.data.as_str())
                .collect(),
            NodeKind::ProcessingInstruction => node
                .proc_inst
                .as_ref()
                .map(|pi| pi.inst.clone())
                .unwrap_or_default(),
            NodeKind::Declaration => String::new(),
            _ => node.data.clone(),
        }
    }
}
