//! XPath Axes Implementation
//!
//! All 13 XPath 1.0 axes:
//! - child, parent, self
//! - descendant, descendant-or-self
//! - ancestor, ancestor-or-self
//! - following, following-sibling
//! - preceding, preceding-sibling
//! - attribute, namespace
//!
//! Results come back in axis order: reverse axes list the nearest node first.

use super::parser::{Axis, NodeTest};
use super::value::XPathNode;
use crate::dom::{DocumentAccess, NodeId, NodeKind};
use std::collections::HashSet;

/// Navigate along an axis from a context node
pub fn navigate<D: DocumentAccess>(doc: &D, context: XPathNode, axis: Axis) -> Vec<XPathNode> {
    match context {
        XPathNode::Node(id) => node_axis(doc, id, axis),
        XPathNode::Attribute(owner, _) => attribute_node_axis(doc, context, owner, axis),
    }
}

fn nodes(ids: Vec<NodeId>) -> Vec<XPathNode> {
    ids.into_iter().map(XPathNode::Node).collect()
}

fn node_axis<D: DocumentAccess>(doc: &D, id: NodeId, axis: Axis) -> Vec<XPathNode> {
    match axis {
        Axis::Child => nodes(doc.children_vec(id)),
        Axis::Descendant => nodes(doc.descendants_vec(id)),
        Axis::DescendantOrSelf => {
            let mut result = vec![XPathNode::Node(id)];
            result.extend(nodes(doc.descendants_vec(id)));
            result
        }
        Axis::Parent => nodes(doc.parent_of(id).into_iter().collect()),
        Axis::Ancestor => nodes(ancestors(doc, id)),
        Axis::AncestorOrSelf => {
            let mut result = vec![XPathNode::Node(id)];
            result.extend(nodes(ancestors(doc, id)));
            result
        }
        Axis::FollowingSibling => nodes(following_siblings(doc, id)),
        Axis::PrecedingSibling => nodes(preceding_siblings(doc, id)),
        Axis::Following => nodes(following(doc, id)),
        Axis::Preceding => nodes(preceding(doc, id)),
        Axis::Self_ => vec![XPathNode::Node(id)],
        Axis::Attribute => (0..doc.attributes(id).len())
            .map(|i| XPathNode::Attribute(id, i))
            .collect(),
        // Namespace nodes are not modelled.
        Axis::Namespace => Vec::new(),
    }
}

/// An attribute's parent is its owner element; it has no children or
/// siblings.
fn attribute_node_axis<D: DocumentAccess>(
    doc: &D,
    attr: XPathNode,
    owner: NodeId,
    axis: Axis,
) -> Vec<XPathNode> {
    match axis {
        Axis::Parent => vec![XPathNode::Node(owner)],
        Axis::Ancestor => {
            let mut result = vec![XPathNode::Node(owner)];
            result.extend(nodes(ancestors(doc, owner)));
            result
        }
        Axis::AncestorOrSelf => {
            let mut result = vec![attr, XPathNode::Node(owner)];
            result.extend(nodes(ancestors(doc, owner)));
            result
        }
        Axis::Self_ | Axis::DescendantOrSelf => vec![attr],
        Axis::Following => {
            let mut result = nodes(doc.descendants_vec(owner));
            result.extend(nodes(following(doc, owner)));
            result
        }
        Axis::Preceding => nodes(preceding(doc, owner)),
        _ => Vec::new(),
    }
}

fn ancestors<D: DocumentAccess>(doc: &D, id: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = id;
    while let Some(parent) = doc.parent_of(current) {
        result.push(parent);
        current = parent;
    }
    result
}

fn following_siblings<D: DocumentAccess>(doc: &D, id: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut sibling = doc.next_sibling_of(id);
    while let Some(s) = sibling {
        result.push(s);
        sibling = doc.next_sibling_of(s);
    }
    result
}

fn preceding_siblings<D: DocumentAccess>(doc: &D, id: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut sibling = doc.prev_sibling_of(id);
    while let Some(s) = sibling {
        result.push(s);
        sibling = doc.prev_sibling_of(s);
    }
    result
}

/// Nodes after `id` in document order, excluding its descendants
fn following<D: DocumentAccess>(doc: &D, id: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current {
        for sibling in following_siblings(doc, node) {
            result.push(sibling);
            result.extend(doc.descendants_vec(sibling));
        }
        current = doc.parent_of(node);
    }
    result
}

/// Nodes before `id` in document order, excluding its ancestors, nearest
/// first
fn preceding<D: DocumentAccess>(doc: &D, id: NodeId) -> Vec<NodeId> {
    let ancestors: HashSet<NodeId> = ancestors(doc, id).into_iter().collect();
    let top = top_of(doc, id);

    let mut result = Vec::new();
    let mut stack = vec![top];
    while let Some(node) = stack.pop() {
        if node == id {
            break;
        }
        if !ancestors.contains(&node) {
            result.push(node);
        }
        stack.extend(doc.children_vec(node).into_iter().rev());
    }
    result.reverse();
    result
}

/// Topmost ancestor of `id` (the document node for attached nodes)
pub(crate) fn top_of<D: DocumentAccess>(doc: &D, id: NodeId) -> NodeId {
    let mut current = id;
    while let Some(parent) = doc.parent_of(current) {
        current = parent;
    }
    current
}

/// Check if a node reached along `axis` matches a node test
pub fn matches_node_test<D: DocumentAccess>(
    doc: &D,
    node: XPathNode,
    test: &NodeTest,
    axis: Axis,
) -> bool {
    match node {
        XPathNode::Attribute(owner, index) => {
            let Some(attr) = doc.attributes(owner).get(index) else {
                return false;
            };
            let principal = axis == Axis::Attribute;
            match test {
                NodeTest::Node => true,
                NodeTest::Any => principal,
                NodeTest::Name(name) => principal && attr.name.local == *name,
                NodeTest::QName(prefix, local) => {
                    principal && attr.name.prefix == *prefix && attr.name.local == *local
                }
                NodeTest::NamespaceWildcard(prefix) => principal && attr.name.prefix == *prefix,
                _ => false,
            }
        }
        XPathNode::Node(id) => {
            let Some(n) = doc.get_node(id) else {
                return false;
            };
            match test {
                NodeTest::Node => true,
                NodeTest::Any => n.kind == NodeKind::Element,
                NodeTest::Name(name) => n.kind == NodeKind::Element && n.data == *name,
                NodeTest::QName(prefix, local) => {
                    n.kind == NodeKind::Element && n.prefix == *prefix && n.data == *local
                }
                NodeTest::NamespaceWildcard(prefix) => {
                    n.kind == NodeKind::Element && n.prefix == *prefix
                }
                NodeTest::Text => n.is_text(),
                NodeTest::Comment => n.kind == NodeKind::Comment,
                NodeTest::ProcessingInstruction(target) => {
                    n.kind == NodeKind::ProcessingInstruction
                        && target.as_ref().map_or(true, |t| n.data == *t)
                }
            }
        }
    }
}
