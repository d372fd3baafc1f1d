//! Streaming Parser
//!
//! Builds the tree incrementally but hands back only the elements matching
//! a target path, pruning each one (and the noise in front of it) before
//! parsing resumes. Memory stays proportional to the largest match plus
//! whatever the target path needs to see of its ancestors.
//!
//! Each element is checked against the target when its start tag is seen.
//! A predicate may look at content that has not been parsed yet, so the
//! decision is only final once the element closes: the target (and the
//! optional filter) is evaluated again against the complete subtree.

use crate::dom::{NodeId, XmlDocument};
use crate::error::{Error, Result};
use crate::parser::builder::{Step, TreeBuilder};
use crate::parser::ParserOptions;
use crate::xpath::{cache, evaluate, CompiledExpr, XPathNode};
use std::io::{BufReader, Read};
use std::sync::Arc;
use tracing::debug;

const NOT_A_NODE_SET: &str = "expression must evaluate to a node-set";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Scanning for the next candidate
    Idle,
    /// `node` matched on its start tag; `open` counts unclosed elements
    /// from the candidate down.
    Candidate { node: NodeId, open: usize },
    /// `node` was handed to the caller; it is pruned on the next read
    Yielded { node: NodeId },
}

/// Pull parser yielding elements that match a path expression.
///
/// ```
/// use xmlstream::StreamParser;
///
/// let xml = "<AAA><BBB>b1</BBB><BBB>b2</BBB></AAA>";
/// let mut sp = StreamParser::new(xml.as_bytes(), "/AAA/BBB").unwrap();
/// let mut seen = Vec::new();
/// while let Some(id) = sp.read().unwrap() {
///     seen.push(sp.document().inner_text(id));
/// }
/// assert_eq!(seen, ["b1", "b2"]);
/// ```
pub struct StreamParser<R: Read> {
    builder: TreeBuilder<BufReader<R>>,
    target: Arc<CompiledExpr>,
    filter: Option<Arc<CompiledExpr>>,
    state: State,
}

impl<R: Read> StreamParser<R> {
    pub fn new(reader: R, target: &str) -> Result<Self> {
        Self::with_options(reader, &ParserOptions::default(), target, None)
    }

    /// Like [`StreamParser::new`], but a completed candidate is only yielded
    /// when it also belongs to the result of `filter`.
    pub fn with_filter(reader: R, target: &str, filter: &str) -> Result<Self> {
        Self::with_options(reader, &ParserOptions::default(), target, Some(filter))
    }

    /// Both expressions are compiled here; a bad expression fails
    /// construction rather than the first read. Line numbers are not
    /// recorded in streaming mode.
    pub fn with_options(
        reader: R,
        options: &ParserOptions,
        target: &str,
        filter: Option<&str>,
    ) -> Result<Self> {
        let target = compile_node_set(target).map_err(|message| Error::InvalidStreamTarget {
            expr: target.to_string(),
            message,
        })?;
        let filter = match filter {
            Some(filter) => Some(compile_node_set(filter).map_err(|message| {
                Error::InvalidStreamFilter {
                    expr: filter.to_string(),
                    message,
                }
            })?),
            None => None,
        };

        Ok(StreamParser {
            builder: TreeBuilder::new(BufReader::new(reader), options.decoder_options()),
            target,
            filter,
            state: State::Idle,
        })
    }

    /// The partial tree. Holds the last yielded node until the next
    /// [`read`](StreamParser::read).
    pub fn document(&self) -> &XmlDocument {
        self.builder.document()
    }

    /// Advance to the next matching element.
    ///
    /// Returns `Ok(None)` once the input is exhausted. The previously
    /// yielded node, and any siblings still in front of it, are removed from
    /// the tree first, so earlier ids must not be used after this call.
    pub fn read(&mut self) -> Result<Option<NodeId>> {
        if let State::Yielded { node } = self.state {
            self.prune(node);
            self.state = State::Idle;
        }

        while let Some(step) = self.builder.step()? {
            match (self.state, step) {
                (State::Idle, Step::Opened(id)) => {
                    if self.member_of(&self.target, id)? {
                        debug!(id, "stream candidate");
                        self.state = State::Candidate { node: id, open: 1 };
                    }
                }
                (State::Candidate { node, open }, Step::Opened(_)) => {
                    self.state = State::Candidate { node, open: open + 1 };
                }
                (State::Candidate { node, open }, Step::Closed(_)) => {
                    if open > 1 {
                        self.state = State::Candidate { node, open: open - 1 };
                        continue;
                    }
                    if self.verify(node)? {
                        debug!(id = node, "stream match yielded");
                        self.state = State::Yielded { node };
                        return Ok(Some(node));
                    }
                    debug!(id = node, "stream candidate rejected");
                    self.builder.document_mut().release(node);
                    self.state = State::Idle;
                }
                _ => {}
            }
        }
        Ok(None)
    }

    /// Re-check a completed candidate against the target and the filter.
    fn verify(&self, node: NodeId) -> Result<bool> {
        if !self.member_of(&self.target, node)? {
            return Ok(false);
        }
        match &self.filter {
            Some(filter) => self.member_of(filter, node),
            None => Ok(true),
        }
    }

    fn member_of(&self, expr: &CompiledExpr, node: NodeId) -> Result<bool> {
        let doc = self.builder.document();
        let value = evaluate(doc, XmlDocument::DOCUMENT, expr)
            .map_err(|message| Error::xpath(expr.source(), message))?;
        Ok(value
            .as_nodeset()
            .is_some_and(|nodes| nodes.contains(&XPathNode::Node(node))))
    }

    /// Remove a yielded node along with its remaining preceding siblings.
    fn prune(&mut self, node: NodeId) {
        let doc = self.builder.document_mut();
        let mut noise = Vec::new();
        let mut sibling = doc.prev_sibling(node);
        while let Some(id) = sibling {
            noise.push(id);
            sibling = doc.prev_sibling(id);
        }
        if !noise.is_empty() {
            debug!(count = noise.len(), "stream noise pruned");
        }
        for id in noise {
            doc.release(id);
        }
        doc.release(node);
    }
}

fn compile_node_set(expr: &str) -> std::result::Result<Arc<CompiledExpr>, String> {
    let compiled = cache::get_or_compile(expr)?;
    if !compiled.is_node_set() {
        return Err(NOT_A_NODE_SET.to_string());
    }
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::DecoderOptions;

    fn collect<R: Read>(sp: &mut StreamParser<R>) -> Vec<(String, String)> {
        let mut out = Vec::new();
        while let Some(id) = sp.read().unwrap() {
            out.push((
                sp.document().output_xml(id, true),
                sp.document().output_xml(XmlDocument::DOCUMENT, false),
            ));
        }
        out
    }

    #[test]
    fn test_yield_and_prune() {
        let xml = "<AAA><BBB>b1</BBB><BBB>b2</BBB></AAA>";
        let mut sp = StreamParser::new(xml.as_bytes(), "/AAA/BBB").unwrap();

        let b1 = sp.read().unwrap().unwrap();
        assert_eq!(sp.document().output_xml(b1, true), "<BBB>b1</BBB>");
        let aaa = sp.document().root_element_id().unwrap();
        assert_eq!(sp.document().output_xml(aaa, true), "<AAA><BBB>b1</BBB></AAA>");

        let b2 = sp.read().unwrap().unwrap();
        assert_eq!(sp.document().output_xml(b2, true), "<BBB>b2</BBB>");
        assert_eq!(sp.document().output_xml(aaa, true), "<AAA><BBB>b2</BBB></AAA>");

        assert_eq!(sp.read().unwrap(), None);
        assert_eq!(sp.read().unwrap(), None);
    }

    #[test]
    fn test_filter_rejects_before_yield() {
        let xml = "<AAA><BBB>b1</BBB><BBB>b2</BBB></AAA>";
        let mut sp =
            StreamParser::with_filter(xml.as_bytes(), "/AAA/BBB", "/AAA/BBB[. != 'b1']").unwrap();
        let first = sp.read().unwrap().unwrap();
        assert_eq!(sp.document().inner_text(first), "b2");
        let aaa = sp.document().root_element_id().unwrap();
        assert_eq!(sp.document().output_xml(aaa, true), "<AAA><BBB>b2</BBB></AAA>");
        assert_eq!(sp.read().unwrap(), None);
    }

    #[test]
    fn test_reject_keeps_noise_until_next_yield() {
        let xml = "<AAA>\n<BBB>b1</BBB>\n<BBB>b2</BBB></AAA>";
        let mut sp =
            StreamParser::with_filter(xml.as_bytes(), "/AAA/BBB", "/AAA/BBB[. != 'b1']").unwrap();

        let b2 = sp.read().unwrap().unwrap();
        let doc = sp.document();
        let aaa = doc.root_element_id().unwrap();
        let kids: Vec<NodeId> = doc.children(aaa).collect();
        assert_eq!(kids.len(), 3);
        for &noise in &kids[..2] {
            let node = doc.get_node(noise).unwrap();
            assert_eq!(node.kind, crate::dom::NodeKind::Text);
            assert_eq!(node.data, "\n");
        }
        assert_eq!(kids[2], b2);
        assert_eq!(doc.output_xml(b2, true), "<BBB>b2</BBB>");

        assert_eq!(sp.read().unwrap(), None);
        assert!(sp.document().first_child(aaa).is_none());
    }

    #[test]
    fn test_wildcard_target_with_filter() {
        let xml = concat!(
            "<ROOT><AAA><CCC>c1</CCC><BBB>b1</BBB><DDD>d1</DDD>",
            "<BBB>b2<ZZZ z=\"1\">z1</ZZZ></BBB><BBB>b3</BBB></AAA>",
            "<ZZZ><BBB>b4</BBB><BBB>b5</BBB><CCC>c3</CCC></ZZZ></ROOT>"
        );
        let mut sp =
            StreamParser::with_filter(xml.as_bytes(), "/ROOT/*/BBB", "/ROOT/*/BBB[. != 'b3']")
                .unwrap();
        let got = collect(&mut sp);
        let expected = [
            (
                "<BBB>b1</BBB>",
                "<?xml version=\"1.0\"?><ROOT><AAA><CCC>c1</CCC><BBB>b1</BBB></AAA></ROOT>",
            ),
            (
                "<BBB>b2<ZZZ z=\"1\">z1</ZZZ></BBB>",
                "<?xml version=\"1.0\"?><ROOT><AAA><DDD>d1</DDD><BBB>b2<ZZZ z=\"1\">z1</ZZZ></BBB></AAA></ROOT>",
            ),
            (
                "<BBB>b4</BBB>",
                "<?xml version=\"1.0\"?><ROOT><AAA></AAA><ZZZ><BBB>b4</BBB></ZZZ></ROOT>",
            ),
            (
                "<BBB>b5</BBB>",
                "<?xml version=\"1.0\"?><ROOT><AAA></AAA><ZZZ><BBB>b5</BBB></ZZZ></ROOT>",
            ),
        ];
        assert_eq!(got.len(), expected.len());
        for ((node, tree), (want_node, want_tree)) in got.iter().zip(expected) {
            assert_eq!(node, want_node);
            assert_eq!(tree, want_tree);
        }
    }

    #[test]
    fn test_union_target() {
        let xml = "<AAA><CCC>c1</CCC><BBB>b1</BBB><DDD>d1</DDD><BBB>b2</BBB></AAA>";
        let mut sp = StreamParser::new(xml.as_bytes(), "/AAA/CCC | /AAA/DDD").unwrap();
        let got = collect(&mut sp);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].0, "<CCC>c1</CCC>");
        assert_eq!(got[0].1, "<?xml version=\"1.0\"?><AAA><CCC>c1</CCC></AAA>");
        assert_eq!(got[1].0, "<DDD>d1</DDD>");
        assert_eq!(got[1].1, "<?xml version=\"1.0\"?><AAA><BBB>b1</BBB><DDD>d1</DDD></AAA>");
    }

    #[test]
    fn test_nested_elements_inside_candidate() {
        let xml = "<r><item><item>inner</item></item><item>x</item></r>";
        let mut sp = StreamParser::new(xml.as_bytes(), "/r/item").unwrap();
        let first = sp.read().unwrap().unwrap();
        assert_eq!(
            sp.document().output_xml(first, true),
            "<item><item>inner</item></item>"
        );
        let second = sp.read().unwrap().unwrap();
        assert_eq!(sp.document().inner_text(second), "x");
        assert_eq!(sp.read().unwrap(), None);
    }

    #[test]
    fn test_cdata_content() {
        let xml = "<AAA><CCC><![CDATA[c1]]></CCC></AAA>";
        let mut sp = StreamParser::new(xml.as_bytes(), "/AAA/CCC").unwrap();
        let id = sp.read().unwrap().unwrap();
        assert_eq!(sp.document().output_xml(id, true), "<CCC><![CDATA[c1]]></CCC>");
        assert_eq!(sp.read().unwrap(), None);
    }

    #[test]
    fn test_default_namespace_target() {
        let xml = r#"<ROOT xmlns="https://example.com/ns"><AAA>a1</AAA><AAA>a2</AAA></ROOT>"#;
        let mut sp = StreamParser::new(
            xml.as_bytes(),
            "/*[local-name()='ROOT']/*[local-name()='AAA' and namespace-uri()='https://example.com/ns']",
        )
        .unwrap();
        let mut texts = Vec::new();
        while let Some(id) = sp.read().unwrap() {
            texts.push(sp.document().inner_text(id));
        }
        assert_eq!(texts, ["a1", "a2"]);
    }

    #[test]
    fn test_pruning_bounds_live_nodes() {
        let mut xml = String::from("<list>");
        for i in 0..500 {
            xml.push_str(&format!("\n  <item n=\"{}\">value</item>", i));
        }
        xml.push_str("\n</list>");

        let mut sp = StreamParser::new(xml.as_bytes(), "/list/item").unwrap();
        let mut count = 0;
        while sp.read().unwrap().is_some() {
            count += 1;
            assert!(sp.document().node_count() < 10);
        }
        assert_eq!(count, 500);
    }

    #[test]
    fn test_invalid_expressions() {
        let err = StreamParser::new("<a/>".as_bytes(), "[invalid").err().unwrap();
        assert!(matches!(err, Error::InvalidStreamTarget { .. }));
        assert!(err
            .to_string()
            .starts_with("invalid stream element xpath '[invalid'"));

        let err = StreamParser::with_filter("<a/>".as_bytes(), "/a", "[invalid")
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidStreamFilter { .. }));
        assert!(err
            .to_string()
            .starts_with("invalid stream filter xpath '[invalid'"));

        let err = StreamParser::new("<a/>".as_bytes(), "count(/a)").err().unwrap();
        assert!(err.to_string().ends_with(NOT_A_NODE_SET));
    }

    #[test]
    fn test_unclosed_candidate_is_error() {
        let mut sp = StreamParser::new("<AAA><BBB>b1".as_bytes(), "/AAA/BBB").unwrap();
        assert!(sp.read().is_err());
    }

    #[test]
    fn test_tolerant_options() {
        let options = ParserOptions {
            decoder: Some(DecoderOptions {
                strict: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        let xml = "<r><x:e>1</x:e><x:e>2</x:e></r>";
        let mut sp = StreamParser::with_options(xml.as_bytes(), &options, "/r/x:e", None).unwrap();
        let mut count = 0;
        while sp.read().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
