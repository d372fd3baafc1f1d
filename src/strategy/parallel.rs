//! Parallel query evaluation
//!
//! Uses Rayon to evaluate many expressions against one document. The
//! document is only read, so the threads share it without locking.

use crate::dom::{NodeId, XmlDocument};
use crate::error::{Error, Result};
use crate::query::{compile, evaluate_compiled};
use crate::xpath::{XPathNode, XPathValue};
use rayon::prelude::*;

/// Evaluate every expression from `node`, one result per expression.
pub fn evaluate_parallel(
    doc: &XmlDocument,
    node: NodeId,
    exprs: &[&str],
) -> Vec<Result<XPathValue>> {
    exprs
        .par_iter()
        .map(|expr| evaluate_compiled(doc, node, &*compile(expr)?))
        .collect()
}

/// Evaluate a node-set expression and map every selected node in parallel.
pub fn xpath_map<F, T>(doc: &XmlDocument, node: NodeId, expr: &str, mapper: F) -> Result<Vec<T>>
where
    F: Fn(XPathNode) -> T + Sync + Send,
    T: Send,
{
    let compiled = compile(expr)?;
    match evaluate_compiled(doc, node, &compiled)? {
        XPathValue::NodeSet(nodes) => Ok(nodes.par_iter().map(|&n| mapper(n)).collect()),
        _ => Err(Error::xpath(expr, "expression must evaluate to a node-set")),
    }
}

/// Evaluate keyed expressions; fails on the first error.
pub fn xmap(
    doc: &XmlDocument,
    node: NodeId,
    queries: &[(&str, &str)],
) -> Result<Vec<(String, XPathValue)>> {
    queries
        .par_iter()
        .map(|(key, expr)| {
            let compiled = compile(expr)?;
            evaluate_compiled(doc, node, &compiled).map(|v| (key.to_string(), v))
        })
        .collect()
}
