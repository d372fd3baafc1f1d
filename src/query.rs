//! Path queries over a document
//!
//! Thin layer over [`crate::xpath`]: expressions are compiled through the
//! process-wide selector cache and evaluated with the given node as both
//! the context node and the root of absolute paths.
//!
//! Results are [`XPathNode`]s in document order. An attribute result names
//! its owner element and index; `node_id()` gives the owner.

use crate::dom::{NodeId, XmlDocument};
use crate::error::{Error, Result};
use crate::xpath::{self, cache, CompiledExpr, XPathNode, XPathValue};
use std::sync::Arc;

pub use crate::xpath::cache::DEFAULT_MAX_ENTRIES as DEFAULT_SELECTOR_CACHE_ENTRIES;

const NOT_A_NODE_SET: &str = "expression must evaluate to a node-set";

/// Compile an expression, reusing a cached compilation when one exists.
pub fn compile(expr: &str) -> Result<Arc<CompiledExpr>> {
    cache::get_or_compile(expr).map_err(|message| Error::xpath(expr, message))
}

/// Turn the selector cache on or off. Turning it off drops every entry.
pub fn set_selector_cache_enabled(enabled: bool) {
    cache::set_enabled(enabled);
}

/// Bound the selector cache; 0 disables it.
pub fn set_selector_cache_max_entries(max_entries: usize) {
    cache::set_max_entries(max_entries);
}

/// Evaluate an expression of any result type.
///
/// ```
/// use xmlstream::{evaluate, parse_str, XPathValue, XmlDocument};
///
/// let doc = parse_str("<r><n>1</n><n>2</n></r>").unwrap();
/// let total = evaluate(&doc, XmlDocument::DOCUMENT, "sum(//n)").unwrap();
/// assert_eq!(total, XPathValue::Number(3.0));
/// ```
pub fn evaluate(doc: &XmlDocument, node: NodeId, expr: &str) -> Result<XPathValue> {
    let compiled = compile(expr)?;
    evaluate_compiled(doc, node, &compiled)
}

pub(crate) fn evaluate_compiled(
    doc: &XmlDocument,
    node: NodeId,
    expr: &CompiledExpr,
) -> Result<XPathValue> {
    xpath::evaluate(doc, node, expr).map_err(|message| Error::xpath(expr.source(), message))
}

/// All nodes selected by `expr`.
pub fn query_all(doc: &XmlDocument, node: NodeId, expr: &str) -> Result<Vec<XPathNode>> {
    let compiled = compile(expr)?;
    query_selector_all(doc, node, &compiled)
}

/// The first node selected by `expr`, in document order.
pub fn query(doc: &XmlDocument, node: NodeId, expr: &str) -> Result<Option<XPathNode>> {
    let compiled = compile(expr)?;
    query_selector(doc, node, &compiled)
}

pub fn query_selector_all(
    doc: &XmlDocument,
    node: NodeId,
    selector: &CompiledExpr,
) -> Result<Vec<XPathNode>> {
    evaluate_compiled(doc, node, selector)?
        .into_nodeset()
        .ok_or_else(|| Error::xpath(selector.source(), NOT_A_NODE_SET))
}

pub fn query_selector(
    doc: &XmlDocument,
    node: NodeId,
    selector: &CompiledExpr,
) -> Result<Option<XPathNode>> {
    Ok(query_selector_all(doc, node, selector)?.into_iter().next())
}

/// Call `f` with the index and node of every match.
pub fn find_each<F>(doc: &XmlDocument, node: NodeId, expr: &str, mut f: F) -> Result<()>
where
    F: FnMut(usize, XPathNode),
{
    find_each_with_break(doc, node, expr, |i, n| {
        f(i, n);
        true
    })
}

/// Like [`find_each`], stopping as soon as `f` returns `false`.
pub fn find_each_with_break<F>(doc: &XmlDocument, node: NodeId, expr: &str, mut f: F) -> Result<()>
where
    F: FnMut(usize, XPathNode) -> bool,
{
    for (i, n) in query_all(doc, node, expr)?.into_iter().enumerate() {
        if !f(i, n) {
            break;
        }
    }
    Ok(())
}

impl XmlDocument {
    /// First non-attribute node selected by `expr` from `id`.
    pub fn select_element(&self, id: NodeId, expr: &str) -> Result<Option<NodeId>> {
        Ok(self.select_elements(id, expr)?.into_iter().next())
    }

    /// Non-attribute nodes selected by `expr` from `id`.
    pub fn select_elements(&self, id: NodeId, expr: &str) -> Result<Vec<NodeId>> {
        Ok(query_all(self, id, expr)?
            .into_iter()
            .filter(|n| !n.is_attribute())
            .map(|n| n.node_id())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    const CATALOG: &str = r#"<?xml version="1.0"?>
<catalog>
   <book id="bk101">
      <author>Gambardella, Matthew</author>
      <title>XML Developer's Guide</title>
      <genre>Computer</genre>
      <price>44.95</price>
   </book>
   <book id="bk102">
      <author>Ralls, Kim</author>
      <title>Midnight Rain</title>
      <genre>Fantasy</genre>
      <price>5.95</price>
   </book>
   <book id="bk103">
      <author>Corets, Eva</author>
      <title>Maeve Ascendant</title>
      <genre>Fantasy</genre>
      <price>5.95</price>
   </book>
</catalog>"#;

    fn id_of(doc: &XmlDocument, n: XPathNode) -> String {
        doc.select_attr(n.node_id(), "id").unwrap_or_default().to_string()
    }

    #[test]
    fn test_catalog_queries() {
        let doc = parse_str(CATALOG).unwrap();
        let top = XmlDocument::DOCUMENT;

        assert_eq!(query_all(&doc, top, "//book").unwrap().len(), 3);

        let book = query(&doc, top, "//book[@id='bk101']").unwrap().unwrap();
        assert_eq!(id_of(&doc, book), "bk101");

        let expensive = query_all(&doc, top, "//book[price>=44.95]").unwrap();
        assert_eq!(expensive.len(), 1);
        assert_eq!(id_of(&doc, expensive[0]), "bk101");

        assert_eq!(query_all(&doc, top, "//book[genre='Fantasy']").unwrap().len(), 2);

        let first = query(&doc, top, "//book[1]").unwrap().unwrap();
        assert_eq!(id_of(&doc, first), "bk101");
    }

    #[test]
    fn test_relative_to_node() {
        let doc = parse_str(CATALOG).unwrap();
        let book = doc
            .select_element(XmlDocument::DOCUMENT, "//book[2]")
            .unwrap()
            .unwrap();
        let title = doc.select_element(book, "title").unwrap().unwrap();
        assert_eq!(doc.inner_text(title), "Midnight Rain");
        assert_eq!(doc.select_elements(book, "*").unwrap().len(), 4);
    }

    #[test]
    fn test_find_each() {
        let doc = parse_str(CATALOG).unwrap();
        let mut ids = Vec::new();
        find_each(&doc, XmlDocument::DOCUMENT, "//book", |i, n| {
            ids.push((i, id_of(&doc, n)));
        })
        .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[2], (2, "bk103".to_string()));

        let mut visited = 0;
        find_each_with_break(&doc, XmlDocument::DOCUMENT, "//book", |i, _| {
            visited += 1;
            i < 1
        })
        .unwrap();
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_attribute_results() {
        let doc = parse_str(r#"<a><b attr="1"/></a>"#).unwrap();
        let attr = query(&doc, XmlDocument::DOCUMENT, "/a/b/@attr").unwrap().unwrap();
        assert!(attr.is_attribute());

        let b = query(&doc, XmlDocument::DOCUMENT, "/a/b/@attr/..").unwrap().unwrap();
        assert_eq!(b, XPathNode::Node(attr.node_id()));
        assert_eq!(doc.get_node(b.node_id()).unwrap().data, "b");
        assert!(doc.select_elements(XmlDocument::DOCUMENT, "//@attr").unwrap().is_empty());
    }

    #[test]
    fn test_attribute_namespaces() {
        let doc = parse_str(
            r#"<root xmlns:n="ns://nested">
                <e id="1" attr="x"/>
                <e id="2" n:attr="y"/>
                <e id="3"><inner n:attr="z"/></e>
            </root>"#,
        )
        .unwrap();
        let ids: Vec<String> = query_all(
            &doc,
            XmlDocument::DOCUMENT,
            "//e[.//@*[namespace-uri()='ns://nested' and local-name()='attr']]",
        )
        .unwrap()
        .into_iter()
        .map(|n| id_of(&doc, n))
        .collect();
        assert_eq!(ids, ["2", "3"]);
    }

    #[test]
    fn test_errors() {
        let doc = parse_str("<a/>").unwrap();
        let err = query(&doc, XmlDocument::DOCUMENT, "//a[@a==1]").unwrap_err();
        assert!(matches!(err, Error::XPath { .. }));

        let err = query_all(&doc, XmlDocument::DOCUMENT, "count(//a)").unwrap_err();
        assert!(err.to_string().ends_with(NOT_A_NODE_SET));

        assert_eq!(
            evaluate(&doc, XmlDocument::DOCUMENT, "count(//a)").unwrap(),
            XPathValue::Number(1.0)
        );
    }
}
