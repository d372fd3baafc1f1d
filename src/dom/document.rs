//! XML Document - Arena-based DOM representation
//!
//! Nodes live in a slot arena addressed by [`NodeId`]. Structural links are
//! stored as ids, so there are no ownership cycles; the document owns every
//! node. Slots of released subtrees go on a free list and are reused, which
//! keeps a streaming parse bounded by the size of the live tree.
//!
//! A `NodeId` is only meaningful while its node is live. Once a subtree is
//! released its ids may be handed out again.

use super::node::{NodeId, NodeKind, QName, XmlAttribute, XmlNode};
use super::DocumentAccess;

/// An XML document stored in arena format
#[derive(Debug, Clone)]
pub struct XmlDocument {
    /// Arena of nodes; `None` marks a free slot
    nodes: Vec<Option<XmlNode>>,
    /// Free slots available for reuse
    free: Vec<NodeId>,
    /// Number of live nodes, document node included
    live: usize,
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Id of the document node
    pub const DOCUMENT: NodeId = 0;

    /// An empty document holding only the document node
    pub fn new() -> Self {
        XmlDocument {
            nodes: vec![Some(XmlNode::document())],
            free: Vec::new(),
            live: 1,
        }
    }

    pub fn document_node_id(&self) -> NodeId {
        Self::DOCUMENT
    }

    /// First element child of the document node
    pub fn root_element_id(&self) -> Option<NodeId> {
        self.children(Self::DOCUMENT)
            .find(|&id| self.kind(id) == Some(NodeKind::Element))
    }

    /// Allocate a detached node
    pub fn create_node(&mut self, mut node: XmlNode) -> NodeId {
        node.parent = None;
        node.first_child = None;
        node.last_child = None;
        node.prev_sibling = None;
        node.next_sibling = None;
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                (self.nodes.len() - 1) as NodeId
            }
        }
    }

    #[inline]
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize).and_then(|slot| slot.as_ref())
    }

    #[inline]
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut XmlNode> {
        self.nodes.get_mut(id as usize).and_then(|slot| slot.as_mut())
    }

    /// Number of live nodes, including the document node
    pub fn node_count(&self) -> usize {
        self.live
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.parent)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.first_child)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.last_child)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.prev_sibling)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.next_sibling)
    }

    /// Topmost ancestor of a node (the document node for attached nodes)
    pub fn top(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Number of ancestor steps up to the top of the tree
    pub fn depth(&self, id: NodeId) -> u32 {
        self.ancestors(id).count() as u32
    }

    // =========================================================================
    // Structural mutation
    // =========================================================================

    /// Append `child` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.get_node(parent).is_none() || self.get_node(child).is_none() {
            return;
        }
        self.remove_from_tree(child);

        let last = self.last_child(parent);
        if let Some(node) = self.get_node_mut(child) {
            node.parent = Some(parent);
            node.prev_sibling = last;
            node.next_sibling = None;
        }
        match last {
            Some(last) => {
                if let Some(node) = self.get_node_mut(last) {
                    node.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(node) = self.get_node_mut(parent) {
                    node.first_child = Some(child);
                }
            }
        }
        if let Some(node) = self.get_node_mut(parent) {
            node.last_child = Some(child);
        }
    }

    /// Insert `child` as the first child of `parent`
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.get_node(parent).is_none() || self.get_node(child).is_none() {
            return;
        }
        self.remove_from_tree(child);

        let first = self.first_child(parent);
        if let Some(node) = self.get_node_mut(child) {
            node.parent = Some(parent);
            node.prev_sibling = None;
            node.next_sibling = first;
        }
        match first {
            Some(first) => {
                if let Some(node) = self.get_node_mut(first) {
                    node.prev_sibling = Some(child);
                }
            }
            None => {
                if let Some(node) = self.get_node_mut(parent) {
                    node.last_child = Some(child);
                }
            }
        }
        if let Some(node) = self.get_node_mut(parent) {
            node.first_child = Some(child);
        }
    }

    /// Append `node` after the last sibling in the chain containing `sibling`.
    ///
    /// `sibling` may be any node of the chain.
    pub fn add_sibling(&mut self, sibling: NodeId, node: NodeId) {
        if sibling == node || self.get_node(node).is_none() {
            return;
        }
        if let Some(parent) = self.parent(sibling) {
            self.add_child(parent, node);
            return;
        }

        // Parentless chain: link after its tail.
        self.remove_from_tree(node);
        let mut tail = sibling;
        while let Some(next) = self.next_sibling(tail) {
            tail = next;
        }
        if tail == node {
            return;
        }
        if let Some(n) = self.get_node_mut(tail) {
            n.next_sibling = Some(node);
        }
        if let Some(n) = self.get_node_mut(node) {
            n.prev_sibling = Some(tail);
        }
    }

    /// Detach a node (and its subtree) from its parent and siblings.
    ///
    /// No-op for a node without parent, such as the document node. The
    /// detached subtree stays allocated; see [`XmlDocument::release`].
    pub fn remove_from_tree(&mut self, id: NodeId) {
        let Some(node) = self.get_node(id) else {
            return;
        };
        let Some(parent) = node.parent else {
            return;
        };
        let prev = node.prev_sibling;
        let next = node.next_sibling;

        match prev {
            Some(prev) => {
                if let Some(n) = self.get_node_mut(prev) {
                    n.next_sibling = next;
                }
            }
            None => {
                if let Some(n) = self.get_node_mut(parent) {
                    n.first_child = next;
                }
            }
        }
        match next {
            Some(next) => {
                if let Some(n) = self.get_node_mut(next) {
                    n.prev_sibling = prev;
                }
            }
            None => {
                if let Some(n) = self.get_node_mut(parent) {
                    n.last_child = prev;
                }
            }
        }

        if let Some(n) = self.get_node_mut(id) {
            n.parent = None;
            n.prev_sibling = None;
            n.next_sibling = None;
        }
    }

    /// Detach a node and free its whole subtree. The ids become invalid.
    ///
    /// The document node cannot be released.
    pub fn release(&mut self, id: NodeId) {
        if id == Self::DOCUMENT || self.get_node(id).is_none() {
            return;
        }
        self.remove_from_tree(id);

        let mut subtree: Vec<NodeId> = self.descendants(id).collect();
        subtree.push(id);
        for nid in subtree {
            if let Some(slot) = self.nodes.get_mut(nid as usize) {
                if slot.take().is_some() {
                    self.free.push(nid);
                    self.live -= 1;
                }
            }
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Append an attribute. `key` is split on its first colon into
    /// prefix and local name. Existing attributes are not checked.
    pub fn add_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let Some(node) = self.get_node_mut(id) {
            node.attributes.push(XmlAttribute {
                name: QName::parse(key),
                value: value.to_string(),
                namespace_uri: String::new(),
            });
        }
    }

    /// Overwrite the value of attribute `key`, adding it when missing.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        let name = QName::parse(key);
        if let Some(node) = self.get_node_mut(id) {
            if let Some(attr) = node.attributes.iter_mut().find(|a| a.name == name) {
                attr.value = value.to_string();
                return;
            }
        }
        self.add_attr(id, key, value);
    }

    /// Remove the first attribute named `key`. Returns whether one was removed.
    pub fn remove_attr(&mut self, id: NodeId, key: &str) -> bool {
        let name = QName::parse(key);
        let Some(node) = self.get_node_mut(id) else {
            return false;
        };
        match node.attributes.iter().position(|a| a.name == name) {
            Some(index) => {
                node.attributes.remove(index);
                true
            }
            None => false,
        }
    }

    /// Value of attribute `name` (`prefix:local` or `local`)
    pub fn select_attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get_node(id)?.attr(name)
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Concatenated text and CDATA content of the node and its descendants.
    /// Comments, declarations and processing instructions contribute nothing.
    pub fn inner_text(&self, id: NodeId) -> String {
        let Some(node) = self.get_node(id) else {
            return String::new();
        };
        if node.is_text() {
            return node.data.clone();
        }
        if matches!(node.kind, NodeKind::Comment | NodeKind::Notation) {
            return String::new();
        }
        let mut out = String::new();
        for desc in self.descendants(id) {
            if let Some(n) = self.get_node(desc) {
                if n.is_text() {
                    out.push_str(&n.data);
                }
            }
        }
        out
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Iterate over all descendants of a node in document order
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        // Initialize stack with all children in reverse order (so first is processed first)
        let mut stack = Vec::new();
        let mut child_id = self.last_child(id);
        while let Some(cid) = child_id {
            stack.push(cid);
            child_id = self.prev_sibling(cid);
        }
        DescendantIter { doc: self, stack }
    }

    /// Iterate over ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> AncestorIter<'_> {
        AncestorIter {
            doc: self,
            next: self.parent(id),
        }
    }
}

/// Iterator over child nodes
pub struct ChildIter<'d> {
    doc: &'d XmlDocument,
    next: Option<NodeId>,
}

impl<'d> Iterator for ChildIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first)
pub struct DescendantIter<'d> {
    doc: &'d XmlDocument,
    stack: Vec<NodeId>,
}

impl<'d> Iterator for DescendantIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Add children to stack in reverse order (so first child is processed first)
        let mut child_id = self.doc.last_child(current);
        while let Some(id) = child_id {
            self.stack.push(id);
            child_id = self.doc.prev_sibling(id);
        }

        Some(current)
    }
}

pub struct AncestorIter<'d> {
    doc: &'d XmlDocument,
    next: Option<NodeId>,
}

impl<'d> Iterator for AncestorIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

impl DocumentAccess for XmlDocument {
    fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        XmlDocument::get_node(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Check parent/child/sibling consistency of the whole tree under `id`.
    fn verify_links(doc: &XmlDocument, id: NodeId) {
        let mut prev = None;
        for child in doc.children(id) {
            assert_eq!(doc.parent(child), Some(id));
            assert_eq!(doc.prev_sibling(child), prev);
            if let Some(p) = prev {
                assert_eq!(doc.next_sibling(p), Some(child));
            }
            verify_links(doc, child);
            prev = Some(child);
        }
        assert_eq!(doc.last_child(id), prev);
        if prev.is_none() {
            assert_eq!(doc.first_child(id), None);
        }
    }

    fn element(doc: &mut XmlDocument, name: &str) -> NodeId {
        doc.create_node(XmlNode::element(name))
    }

    fn names(doc: &XmlDocument, id: NodeId) -> Vec<String> {
        doc.children(id)
            .map(|c| doc.get_node(c).unwrap().data.clone())
            .collect()
    }

    #[test]
    fn test_add_child_and_sibling() {
        let mut doc = XmlDocument::new();
        let root = element(&mut doc, "root");
        doc.add_child(XmlDocument::DOCUMENT, root);
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        let c = element(&mut doc, "c");
        doc.add_child(root, a);
        doc.add_child(root, b);
        // any node of the chain works as anchor
        doc.add_sibling(a, c);

        assert_eq!(names(&doc, root), vec!["a", "b", "c"]);
        assert_eq!(doc.root_element_id(), Some(root));
        verify_links(&doc, XmlDocument::DOCUMENT);
    }

    #[test]
    fn test_prepend_child() {
        let mut doc = XmlDocument::new();
        let root = element(&mut doc, "root");
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        doc.prepend_child(root, a);
        doc.prepend_child(root, b);
        assert_eq!(names(&doc, root), vec!["b", "a"]);
        verify_links(&doc, root);
    }

    #[test]
    fn test_remove_from_tree_positions() {
        for victim in 0..3 {
            let mut doc = XmlDocument::new();
            let root = element(&mut doc, "root");
            doc.add_child(XmlDocument::DOCUMENT, root);
            let ids: Vec<NodeId> = ["a", "b", "c"]
                .iter()
                .map(|n| {
                    let id = element(&mut doc, n);
                    doc.add_child(root, id);
                    id
                })
                .collect();
            doc.remove_from_tree(ids[victim]);
            verify_links(&doc, XmlDocument::DOCUMENT);
            assert_eq!(doc.children(root).count(), 2);
            assert_eq!(doc.parent(ids[victim]), None);
        }
    }

    #[test]
    fn test_detached_subtree_keeps_children() {
        let mut doc = XmlDocument::new();
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        let c = element(&mut doc, "c");
        doc.add_child(XmlDocument::DOCUMENT, a);
        doc.add_child(a, b);
        doc.add_child(b, c);
        doc.remove_from_tree(b);
        assert_eq!(doc.first_child(a), None);
        assert_eq!(doc.first_child(b), Some(c));
        assert_eq!(doc.parent(c), Some(b));
    }

    #[test]
    fn test_remove_document_node_is_noop() {
        let mut doc = XmlDocument::new();
        let a = element(&mut doc, "a");
        doc.add_child(XmlDocument::DOCUMENT, a);
        doc.remove_from_tree(XmlDocument::DOCUMENT);
        doc.release(XmlDocument::DOCUMENT);
        assert_eq!(doc.first_child(XmlDocument::DOCUMENT), Some(a));
        verify_links(&doc, XmlDocument::DOCUMENT);
    }

    #[test]
    fn test_release_reuses_slots() {
        let mut doc = XmlDocument::new();
        let a = element(&mut doc, "a");
        doc.add_child(XmlDocument::DOCUMENT, a);
        let b = element(&mut doc, "b");
        let c = element(&mut doc, "c");
        doc.add_child(a, b);
        doc.add_child(b, c);
        assert_eq!(doc.node_count(), 4);

        doc.release(b);
        assert_eq!(doc.node_count(), 2);
        assert!(doc.get_node(b).is_none());
        assert!(doc.get_node(c).is_none());

        let d = element(&mut doc, "d");
        assert!(d == b || d == c);
        assert_eq!(doc.node_count(), 3);
    }

    #[test]
    fn test_attributes() {
        let mut doc = XmlDocument::new();
        let a = element(&mut doc, "a");
        doc.add_attr(a, "ns:k1", "v1");
        doc.add_attr(a, "k2", "v2");
        assert_eq!(doc.select_attr(a, "ns:k1"), Some("v1"));
        assert_eq!(doc.select_attr(a, "k1"), None);

        doc.set_attr(a, "k2", "changed");
        doc.set_attr(a, "k3", "new");
        assert_eq!(doc.select_attr(a, "k2"), Some("changed"));
        assert_eq!(doc.get_node(a).unwrap().attributes.len(), 3);

        assert!(doc.remove_attr(a, "ns:k1"));
        assert!(!doc.remove_attr(a, "ns:k1"));
        assert_eq!(doc.get_node(a).unwrap().attributes.len(), 2);
    }

    #[test]
    fn test_inner_text_skips_comments() {
        let mut doc = XmlDocument::new();
        let a = element(&mut doc, "a");
        let t1 = doc.create_node(XmlNode::text("x"));
        let c = doc.create_node(XmlNode::new(NodeKind::Comment, "ignored"));
        let b = element(&mut doc, "b");
        let t2 = doc.create_node(XmlNode::new(NodeKind::CharData, "y"));
        doc.add_child(a, t1);
        doc.add_child(a, c);
        doc.add_child(a, b);
        doc.add_child(b, t2);
        assert_eq!(doc.inner_text(a), "xy");
        assert_eq!(doc.inner_text(c), "");
        assert_eq!(doc.inner_text(t2), "y");
    }

    #[test]
    fn test_depth_and_ancestors() {
        let mut doc = XmlDocument::new();
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        doc.add_child(XmlDocument::DOCUMENT, a);
        doc.add_child(a, b);
        assert_eq!(doc.depth(b), 2);
        assert_eq!(doc.ancestors(b).collect::<Vec<_>>(), vec![a, XmlDocument::DOCUMENT]);
        assert_eq!(doc.top(b), XmlDocument::DOCUMENT);
    }
}
