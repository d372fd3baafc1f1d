//! Source line numbers
//!
//! The tokenizer does not track positions per node, so line numbers are
//! recovered after parsing: each element, comment, declaration and text
//! node is matched to the Nth occurrence of its pattern in the source,
//! where N counts nodes with the same pattern in document order. This is a
//! best-effort mapping. Text that was entity-decoded, or markup that also
//! appears inside comments or CDATA, can shift the match. Nodes that are
//! not found get line 1.

use crate::dom::{NodeId, NodeKind, XmlDocument};
use crate::error::Result;
use crate::parser::{parse_with_options, ParserOptions};
use memchr::memmem;
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// Parse a whole document and record the source line of its nodes in
/// `XmlNode::line_number`.
pub fn parse_with_line_numbers<R: Read>(reader: R) -> Result<XmlDocument> {
    let options = ParserOptions {
        with_line_numbers: true,
        ..Default::default()
    };
    parse_with_options(reader, &options)
}

/// Byte offsets where each line starts
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(input: &[u8]) -> Self {
        let mut starts = vec![0];
        starts.extend(memchr::memchr_iter(b'\n', input).map(|i| i + 1));
        LineIndex { starts }
    }

    /// 1-based line containing byte `pos`
    fn line_of(&self, pos: usize) -> usize {
        self.starts.partition_point(|&start| start <= pos)
    }
}

#[derive(Hash, PartialEq, Eq)]
enum Pattern {
    Element(String),
    Comment(String),
    Text(String),
}

pub(crate) fn annotate(doc: &mut XmlDocument, input: &[u8]) {
    let lines = LineIndex::new(input);
    let mut seen: HashMap<Pattern, usize> = HashMap::new();
    let ids: Vec<NodeId> = doc.descendants(XmlDocument::DOCUMENT).collect();
    let mut annotated = 0usize;

    for id in ids {
        let Some(node) = doc.get_node(id) else {
            continue;
        };
        let position = match node.kind {
            NodeKind::Element => {
                let name = node.name();
                let n = bump(&mut seen, Pattern::Element(name.clone()));
                nth_element(input, &name, n)
            }
            NodeKind::Comment => {
                let needle = format!("<!--{}-->", node.data);
                let n = bump(&mut seen, Pattern::Comment(node.data.clone()));
                nth_occurrence(input, needle.as_bytes(), n)
            }
            NodeKind::Declaration if node.data == "xml" => memmem::find(input, b"<?xml"),
            NodeKind::Text | NodeKind::CharData => {
                let text = node.data.trim();
                if text.is_empty() {
                    continue;
                }
                let text = text.to_string();
                let n = bump(&mut seen, Pattern::Text(text.clone()));
                nth_occurrence(input, text.as_bytes(), n)
            }
            _ => continue,
        };

        if let Some(node) = doc.get_node_mut(id) {
            node.line_number = position.map_or(1, |pos| lines.line_of(pos));
            annotated += 1;
        }
    }
    debug!(annotated, lines = lines.starts.len(), "line numbers recorded");
}

/// Count one more node with `pattern`, returning its 1-based occurrence
fn bump(seen: &mut HashMap<Pattern, usize>, pattern: Pattern) -> usize {
    let n = seen.entry(pattern).or_insert(0);
    *n += 1;
    *n
}

fn nth_occurrence(input: &[u8], needle: &[u8], n: usize) -> Option<usize> {
    memmem::find_iter(input, needle).nth(n.checked_sub(1)?)
}

/// Nth start tag `<name` followed by whitespace, `>` or `/`
fn nth_element(input: &[u8], name: &str, n: usize) -> Option<usize> {
    let needle = format!("<{}", name);
    memmem::find_iter(input, needle.as_bytes())
        .filter(|&pos| {
            matches!(
                input.get(pos + needle.len()),
                None | Some(b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/')
            )
        })
        .nth(n.checked_sub(1)?)
}
