//! XPath Evaluation Engine
//!
//! Runs a compiled program on a value stack. Node-sets are kept in
//! document order without duplicates; order is taken from a preorder walk
//! of the tree, computed once per evaluation and only when needed, since
//! arena ids say nothing about position once nodes have been moved or
//! slots reused.

use super::axes::{matches_node_test, navigate, top_of};
use super::compiler::{CompiledExpr, Op, Program};
use super::functions;
use super::parser::BinaryOp;
use super::value::{format_number, parse_number, XPathNode, XPathValue};
use crate::dom::{DocumentAccess, NodeId, NodeKind};
use once_cell::unsync::OnceCell;
use std::collections::HashMap;

const NOT_A_NODE_SET: &str = "expression must evaluate to a node-set";

/// Preorder positions of every node under one top node
pub(crate) struct DocumentOrder {
    top: NodeId,
    index: OnceCell<HashMap<NodeId, usize>>,
}

impl DocumentOrder {
    fn new(top: NodeId) -> Self {
        DocumentOrder {
            top,
            index: OnceCell::new(),
        }
    }

    fn key<D: DocumentAccess>(&self, doc: &D, node: XPathNode) -> (usize, usize) {
        let index = self.index.get_or_init(|| {
            let mut index = HashMap::new();
            let mut stack = vec![self.top];
            while let Some(id) = stack.pop() {
                index.insert(id, index.len());
                stack.extend(doc.children_vec(id).into_iter().rev());
            }
            index
        });
        let position = |id: NodeId| index.get(&id).copied().unwrap_or(usize::MAX);
        match node {
            XPathNode::Node(id) => (position(id), 0),
            XPathNode::Attribute(owner, i) => (position(owner), i + 1),
        }
    }
}

/// Evaluation context - generic over document type
pub struct EvalContext<'a, D: DocumentAccess> {
    pub doc: &'a D,
    /// Node `/` refers to
    pub root: NodeId,
    pub node: XPathNode,
    pub position: usize,
    pub size: usize,
    order: &'a DocumentOrder,
}

impl<'a, D: DocumentAccess> EvalContext<'a, D> {
    fn with_node(&self, node: XPathNode, position: usize, size: usize) -> Self {
        EvalContext {
            doc: self.doc,
            root: self.root,
            node,
            position,
            size,
            order: self.order,
        }
    }

    /// String-value of a single node-set item
    pub fn node_string(&self, node: XPathNode) -> String {
        match node {
            XPathNode::Node(id) => self.doc.string_value(id),
            XPathNode::Attribute(owner, i) => self
                .doc
                .attributes(owner)
                .get(i)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
        }
    }

    /// string() conversion
    pub fn string_of(&self, value: &XPathValue) -> String {
        match value {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|&n| self.node_string(n))
                .unwrap_or_default(),
            XPathValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::String(s) => s.clone(),
        }
    }

    /// number() conversion
    pub fn number_of(&self, value: &XPathValue) -> f64 {
        match value {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            _ => parse_number(&self.string_of(value)),
        }
    }

    /// Local name of an element, attribute or PI target
    pub fn local_name(&self, node: XPathNode) -> String {
        match node {
            XPathNode::Attribute(owner, i) => self
                .doc
                .attributes(owner)
                .get(i)
                .map(|a| a.name.local.clone())
                .unwrap_or_default(),
            XPathNode::Node(id) => self.doc.node_local_name(id).unwrap_or("").to_string(),
        }
    }

    /// Qualified name as written
    pub fn qualified_name(&self, node: XPathNode) -> String {
        match node {
            XPathNode::Attribute(owner, i) => self
                .doc
                .attributes(owner)
                .get(i)
                .map(|a| a.name.qualified())
                .unwrap_or_default(),
            XPathNode::Node(id) => match self.doc.get_node(id) {
                Some(n) if n.kind == NodeKind::Element => n.name(),
                Some(n) if n.kind == NodeKind::ProcessingInstruction => n.data.clone(),
                _ => String::new(),
            },
        }
    }

    pub fn namespace_uri(&self, node: XPathNode) -> String {
        match node {
            XPathNode::Attribute(owner, i) => self
                .doc
                .attributes(owner)
                .get(i)
                .map(|a| a.namespace_uri.clone())
                .unwrap_or_default(),
            XPathNode::Node(id) => match self.doc.get_node(id) {
                Some(n) if n.kind == NodeKind::Element => n.namespace_uri.clone(),
                _ => String::new(),
            },
        }
    }

    fn sort_unique(&self, nodes: &mut Vec<XPathNode>) {
        nodes.sort_by_cached_key(|&n| self.order.key(self.doc, n));
        nodes.dedup();
    }
}

/// Evaluate a compiled expression with `root` as both the context node and
/// the node `/` refers to.
pub fn evaluate<D: DocumentAccess>(
    doc: &D,
    root: NodeId,
    expr: &CompiledExpr,
) -> Result<XPathValue, String> {
    let order = DocumentOrder::new(top_of(doc, root));
    let ctx = EvalContext {
        doc,
        root,
        node: XPathNode::Node(root),
        position: 1,
        size: 1,
        order: &order,
    };
    evaluate_program(expr.program(), &ctx)
}

fn pop(stack: &mut Vec<XPathValue>) -> Result<XPathValue, String> {
    stack
        .pop()
        .ok_or_else(|| "malformed program: stack underflow".to_string())
}

fn pop_nodeset(stack: &mut Vec<XPathValue>) -> Result<Vec<XPathNode>, String> {
    pop(stack)?
        .into_nodeset()
        .ok_or_else(|| NOT_A_NODE_SET.to_string())
}

fn evaluate_program<D: DocumentAccess>(
    program: &Program,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, String> {
    let mut stack: Vec<XPathValue> = Vec::new();

    for op in &program.ops {
        match op {
            Op::Root => stack.push(XPathValue::single_node(XPathNode::Node(ctx.root))),
            Op::Context => stack.push(XPathValue::single_node(ctx.node)),

            Op::Step {
                axis,
                test,
                predicates,
            } => {
                let inputs = pop_nodeset(&mut stack)?;
                let mut result = Vec::new();
                for &input in &inputs {
                    let mut matched: Vec<XPathNode> = navigate(ctx.doc, input, *axis)
                        .into_iter()
                        .filter(|&n| matches_node_test(ctx.doc, n, test, *axis))
                        .collect();
                    for predicate in predicates {
                        matched = apply_predicate(matched, predicate, ctx)?;
                    }
                    result.extend(matched);
                }
                if inputs.len() > 1 || axis.is_reverse() {
                    ctx.sort_unique(&mut result);
                }
                stack.push(XPathValue::NodeSet(result));
            }

            Op::Filter(predicate) => {
                let nodes = pop_nodeset(&mut stack)?;
                stack.push(XPathValue::NodeSet(apply_predicate(nodes, predicate, ctx)?));
            }

            Op::Union => {
                let right = pop_nodeset(&mut stack)?;
                let mut left = pop_nodeset(&mut stack)?;
                left.extend(right);
                ctx.sort_unique(&mut left);
                stack.push(XPathValue::NodeSet(left));
            }

            Op::Number(n) => stack.push(XPathValue::Number(*n)),
            Op::String(s) => stack.push(XPathValue::String(s.clone())),

            Op::Negate => {
                let value = pop(&mut stack)?;
                stack.push(XPathValue::Number(-ctx.number_of(&value)));
            }

            Op::Binary(op) => {
                let right = pop(&mut stack)?;
                let left = pop(&mut stack)?;
                let result = match op {
                    BinaryOp::Or => XPathValue::Boolean(left.to_boolean() || right.to_boolean()),
                    BinaryOp::And => XPathValue::Boolean(left.to_boolean() && right.to_boolean()),
                    BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq => XPathValue::Boolean(compare(ctx, *op, &left, &right)),
                    BinaryOp::Add => XPathValue::Number(ctx.number_of(&left) + ctx.number_of(&right)),
                    BinaryOp::Sub => XPathValue::Number(ctx.number_of(&left) - ctx.number_of(&right)),
                    BinaryOp::Mul => XPathValue::Number(ctx.number_of(&left) * ctx.number_of(&right)),
                    BinaryOp::Div => XPathValue::Number(ctx.number_of(&left) / ctx.number_of(&right)),
                    BinaryOp::Mod => XPathValue::Number(ctx.number_of(&left) % ctx.number_of(&right)),
                };
                stack.push(result);
            }

            Op::Call(name, arg_count) => {
                if stack.len() < *arg_count {
                    return Err("malformed program: stack underflow".to_string());
                }
                let args = stack.split_off(stack.len() - arg_count);
                stack.push(functions::call(name, args, ctx)?);
            }
        }
    }

    pop(&mut stack)
}

/// Keep the nodes for which the predicate holds. A number predicate is
/// compared against the proximity position.
fn apply_predicate<D: DocumentAccess>(
    nodes: Vec<XPathNode>,
    predicate: &Program,
    ctx: &EvalContext<'_, D>,
) -> Result<Vec<XPathNode>, String> {
    let size = nodes.len();
    let mut kept = Vec::new();
    for (i, node) in nodes.into_iter().enumerate() {
        let sub = ctx.with_node(node, i + 1, size);
        let keep = match evaluate_program(predicate, &sub)? {
            XPathValue::Number(n) => n == (i + 1) as f64,
            other => other.to_boolean(),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}

/// Comparison with XPath 1.0 node-set semantics: a node-set compares true
/// if any of its members does.
fn compare<D: DocumentAccess>(
    ctx: &EvalContext<'_, D>,
    op: BinaryOp,
    left: &XPathValue,
    right: &XPathValue,
) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_strings: Vec<XPathValue> = r
                .iter()
                .map(|&n| XPathValue::String(ctx.node_string(n)))
                .collect();
            l.iter().any(|&n| {
                let ls = XPathValue::String(ctx.node_string(n));
                right_strings.iter().any(|rs| compare_atomic(op, &ls, rs))
            })
        }
        (XPathValue::NodeSet(nodes), XPathValue::Boolean(_)) => {
            compare_atomic(op, &XPathValue::Boolean(!nodes.is_empty()), right)
        }
        (XPathValue::Boolean(_), XPathValue::NodeSet(nodes)) => {
            compare_atomic(op, left, &XPathValue::Boolean(!nodes.is_empty()))
        }
        (XPathValue::NodeSet(nodes), other) => nodes
            .iter()
            .any(|&n| compare_atomic(op, &XPathValue::String(ctx.node_string(n)), other)),
        (other, XPathValue::NodeSet(nodes)) => nodes
            .iter()
            .any(|&n| compare_atomic(op, other, &XPathValue::String(ctx.node_string(n)))),
        _ => compare_atomic(op, left, right),
    }
}

fn atomic_number(value: &XPathValue) -> f64 {
    match value {
        XPathValue::Number(n) => *n,
        XPathValue::Boolean(b) => f64::from(u8::from(*b)),
        XPathValue::String(s) => parse_number(s),
        XPathValue::NodeSet(_) => f64::NAN,
    }
}

fn compare_atomic(op: BinaryOp, left: &XPathValue, right: &XPathValue) -> bool {
    let equality = matches!(op, BinaryOp::Eq | BinaryOp::NotEq);
    if equality {
        let equal = match (left, right) {
            (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
                left.to_boolean() == right.to_boolean()
            }
            (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                atomic_number(left) == atomic_number(right)
            }
            (XPathValue::String(l), XPathValue::String(r)) => l == r,
            _ => false,
        };
        return if op == BinaryOp::Eq { equal } else { !equal };
    }

    let (l, r) = (atomic_number(left), atomic_number(right));
    match op {
        BinaryOp::Lt => l < r,
        BinaryOp::LtEq => l <= r,
        BinaryOp::Gt => l > r,
        BinaryOp::GtEq => l >= r,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;
    use crate::parser::parse_str;
    use crate::xpath::compiler::compile;

    fn eval(doc: &XmlDocument, xpath: &str) -> XPathValue {
        evaluate(doc, XmlDocument::DOCUMENT, &compile(xpath).unwrap()).unwrap()
    }

    fn count(doc: &XmlDocument, xpath: &str) -> usize {
        eval(doc, xpath).as_nodeset().map_or(0, |n| n.len())
    }

    #[test]
    fn test_paths() {
        let doc = parse_str("<root><a><b/></a><a><b/><b/></a></root>").unwrap();
        assert_eq!(count(&doc, "/root/a"), 2);
        assert_eq!(count(&doc, "//b"), 3);
        assert_eq!(count(&doc, "/root/*/b"), 3);
        assert_eq!(count(&doc, "/missing"), 0);
        assert_eq!(count(&doc, "/"), 1);
    }

    #[test]
    fn test_positional_predicates_per_step() {
        let doc = parse_str("<root><a><b>1</b><b>2</b></a><a><b>3</b></a></root>").unwrap();
        // [1] applies per parent
        assert_eq!(count(&doc, "//a/b[1]"), 2);
        assert_eq!(count(&doc, "(//a/b)[1]"), 1);
        assert_eq!(count(&doc, "//b[last()]"), 2);
        let doc_string = |xpath| {
            let value = eval(&doc, xpath);
            let order = DocumentOrder::new(XmlDocument::DOCUMENT);
            let ctx = EvalContext {
                doc: &doc,
                root: XmlDocument::DOCUMENT,
                node: XPathNode::Node(XmlDocument::DOCUMENT),
                position: 1,
                size: 1,
                order: &order,
            };
            ctx.string_of(&value)
        };
        assert_eq!(doc_string("(//b)[3]"), "3");
        assert_eq!(doc_string("//b[2]/preceding-sibling::b[1]"), "1");
    }

    #[test]
    fn test_comparisons() {
        let doc = parse_str("<r><p>44.95</p><p>5.95</p><g>Fantasy</g></r>").unwrap();
        assert_eq!(count(&doc, "/r[p>=44.95]"), 1);
        assert_eq!(count(&doc, "/r[p>50]"), 0);
        assert_eq!(count(&doc, "/r[g='Fantasy']"), 1);
        assert_eq!(count(&doc, "//p[. != '5.95']"), 1);
        assert!(eval(&doc, "//p = //p").to_boolean());
        assert!(eval(&doc, "1 = true()").to_boolean());
        assert!(!eval(&doc, "'abc' = 'abd'").to_boolean());
    }

    #[test]
    fn test_arithmetic() {
        let doc = parse_str("<r/>").unwrap();
        assert_eq!(eval(&doc, "1 + 2 * 3"), XPathValue::Number(7.0));
        assert_eq!(eval(&doc, "7 mod 3"), XPathValue::Number(1.0));
        assert_eq!(eval(&doc, "-(6 div 4)"), XPathValue::Number(-1.5));
    }

    #[test]
    fn test_union_in_document_order() {
        let doc = parse_str("<r><c/><d/><c/></r>").unwrap();
        let nodes = eval(&doc, "/r/d | /r/c").into_nodeset().unwrap();
        let names: Vec<String> = nodes
            .iter()
            .map(|n| doc.get_node(n.node_id()).unwrap().data.clone())
            .collect();
        assert_eq!(names, vec!["c", "d", "c"]);
    }

    #[test]
    fn test_attributes() {
        let doc = parse_str(r#"<a><b attr="1"/></a>"#).unwrap();
        let nodes = eval(&doc, "/a/b/@attr/..").into_nodeset().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.get_node(nodes[0].node_id()).unwrap().data, "b");
        assert_eq!(count(&doc, "//@*"), 1);
        assert_eq!(count(&doc, "//b[@attr='1']"), 1);
        assert_eq!(count(&doc, "//b[@attr=2]"), 0);
    }

    #[test]
    fn test_order_after_mutation() {
        let mut doc = parse_str("<r><x/><y/></r>").unwrap();
        let r = doc.root_element_id().unwrap();
        let x = doc.first_child(r).unwrap();
        // move x after y: ids no longer follow document order
        doc.remove_from_tree(x);
        doc.add_child(r, x);
        let nodes = eval(&doc, "/r/y | /r/x").into_nodeset().unwrap();
        assert_eq!(nodes[0].node_id(), doc.first_child(r).unwrap());
        assert_eq!(nodes[1], XPathNode::Node(x));
    }

    #[test]
    fn test_type_errors() {
        let doc = parse_str("<r/>").unwrap();
        let compiled = compile("count(1)").unwrap();
        assert_eq!(
            evaluate(&doc, XmlDocument::DOCUMENT, &compiled).unwrap_err(),
            NOT_A_NODE_SET
        );
    }
}
