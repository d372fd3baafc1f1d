//! Tree builder
//!
//! Pulls events from the [`Decoder`] and appends one node per event to an
//! [`XmlDocument`]. Hierarchy comes from an explicit stack of open elements:
//! a start tag pushes, an end tag pops, everything else is appended to the
//! element on top of the stack.
//!
//! The lookahead cache is active while each event is decoded, so the raw
//! bytes of the token are available to tell CDATA from text and to recover
//! the prefix an element was written with.

use crate::dom::namespace::PrefixTable;
use crate::dom::{NodeId, NodeKind, ProcInst, QName, XmlAttribute, XmlDocument, XmlNode};
use crate::error::{Error, Result};
use crate::reader::{Attr, DecoderOptions, Decoder, Name, XmlEvent};
use std::io::BufRead;
use tracing::trace;

/// What a single [`TreeBuilder::step`] did to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// An element was created and is now open
    Opened(NodeId),
    /// The element on top of the stack was closed
    Closed(NodeId),
    /// A leaf node (text, comment, PI, ...) was appended
    Added(NodeId),
}

pub(crate) struct TreeBuilder<R> {
    decoder: Decoder<R>,
    doc: XmlDocument,
    /// Open elements; `open[0]` is the document node
    open: Vec<NodeId>,
    prefixes: PrefixTable,
    seen_declaration: bool,
    strict: bool,
}

impl<R: BufRead> TreeBuilder<R> {
    pub fn new(reader: R, options: DecoderOptions) -> Self {
        let strict = options.strict;
        TreeBuilder {
            decoder: Decoder::with_options(reader, options),
            doc: XmlDocument::new(),
            open: vec![XmlDocument::DOCUMENT],
            prefixes: PrefixTable::new(),
            seen_declaration: false,
            strict,
        }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut XmlDocument {
        &mut self.doc
    }

    pub fn into_document(self) -> XmlDocument {
        self.doc
    }

    /// Depth of a node appended now; top-level nodes are at 1
    fn level(&self) -> u32 {
        self.open.len() as u32
    }

    fn parent(&self) -> NodeId {
        self.open.last().copied().unwrap_or(XmlDocument::DOCUMENT)
    }

    /// Consume one event. `Ok(None)` at end of input.
    pub fn step(&mut self) -> Result<Option<Step>> {
        loop {
            self.decoder.cache_mut().start_caching();
            let event = self.decoder.next_event();
            self.decoder.cache_mut().stop_caching();

            let Some(event) = event? else {
                return Ok(None);
            };

            let step = match event {
                XmlEvent::StartElement { name, attributes } => {
                    Step::Opened(self.start_element(name, attributes)?)
                }
                XmlEvent::EndElement { .. } => {
                    if self.open.len() <= 1 {
                        continue;
                    }
                    let Some(id) = self.open.pop() else {
                        continue;
                    };
                    self.prefixes.pop_frame();
                    trace!(id, "element closed");
                    Step::Closed(id)
                }
                XmlEvent::CharData(text) => {
                    let kind = if self.is_cdata() {
                        NodeKind::CharData
                    } else {
                        NodeKind::Text
                    };
                    Step::Added(self.append(XmlNode::new(kind, text)))
                }
                XmlEvent::Comment(text) => {
                    Step::Added(self.append(XmlNode::new(NodeKind::Comment, text)))
                }
                XmlEvent::Directive(text) => {
                    Step::Added(self.append(XmlNode::new(NodeKind::Notation, text)))
                }
                XmlEvent::ProcInst { target, inst } => {
                    Step::Added(self.processing_instruction(target, inst))
                }
            };
            return Ok(Some(step));
        }
    }

    fn append(&mut self, node: XmlNode) -> NodeId {
        let level = self.level();
        let kind = node.kind;
        let id = self.doc.create_node(node.with_level(level));
        self.doc.add_child(self.parent(), id);
        trace!(id, ?kind, level, "node added");
        id
    }

    /// The tokenizer reports text and CDATA alike; the raw bytes tell them
    /// apart. Markup is always captured from its leading `<`.
    fn is_cdata(&self) -> bool {
        let head = self.decoder.cache().cache_with_limit(9).to_ascii_uppercase();
        head.starts_with(b"<![CDATA[")
    }

    /// Documents without `<?xml ...?>` get one, as the first child.
    fn synthesize_declaration(&mut self) {
        let mut decl = XmlNode::new(NodeKind::Declaration, "xml").with_level(1);
        decl.attributes.push(XmlAttribute {
            name: QName::new("", "version"),
            value: "1.0".to_string(),
            namespace_uri: String::new(),
        });
        let id = self.doc.create_node(decl);
        self.doc.prepend_child(XmlDocument::DOCUMENT, id);
        self.seen_declaration = true;
        trace!(id, "declaration synthesized");
    }

    fn start_element(&mut self, name: Name, attributes: Vec<Attr>) -> Result<NodeId> {
        if !self.seen_declaration {
            self.synthesize_declaration();
        }

        let level = self.level();
        self.prefixes.push_frame(level);
        // Declarations first: an element may use the namespace it declares.
        for attr in &attributes {
            if attr.name.space.is_empty() && attr.name.local == "xmlns" {
                self.prefixes.declare_default(&attr.value);
            } else if attr.name.space == "xmlns" {
                self.prefixes.declare(&attr.name.local, &attr.value);
            }
        }

        let mut node = XmlNode::element(name.local.clone()).with_level(level);
        if !name.space.is_empty() {
            match self.prefixes.prefix_for(&name.space) {
                Some(prefix) => {
                    if !prefix.is_empty() && self.written_with_prefix(prefix, &name.local) {
                        node.prefix = prefix.to_string();
                    }
                    node.namespace_uri = name.space.clone();
                }
                None if self.strict => {
                    self.prefixes.pop_frame();
                    return Err(Error::MissingNamespace(name.space));
                }
                // Unbound prefix, kept as written.
                None => node.prefix = name.space.clone(),
            }
        }

        node.attributes = attributes
            .into_iter()
            .map(|attr| {
                let prefix = self
                    .prefixes
                    .prefix_for(&attr.name.space)
                    .map(str::to_string)
                    .unwrap_or_else(|| attr.name.space.clone());
                XmlAttribute {
                    name: QName::new(prefix, attr.name.local),
                    value: attr.value,
                    namespace_uri: attr.name.space,
                }
            })
            .collect();

        let id = self.doc.create_node(node);
        self.doc.add_child(self.parent(), id);
        self.open.push(id);
        trace!(id, name = %name.local, level, "element opened");
        Ok(id)
    }

    fn written_with_prefix(&self, prefix: &str, local: &str) -> bool {
        let qualified = format!("<{}:{}", prefix, local);
        self.decoder
            .cache()
            .cache_with_limit(qualified.len())
            .starts_with(qualified.as_bytes())
    }

    fn processing_instruction(&mut self, target: String, inst: String) -> NodeId {
        let mut node = if target == "xml" {
            XmlNode::new(NodeKind::Declaration, "xml")
        } else {
            let mut pi = XmlNode::new(NodeKind::ProcessingInstruction, target.clone());
            pi.proc_inst = Some(ProcInst {
                target,
                inst: inst.trim().to_string(),
            });
            pi
        };

        for pair in inst.split(' ') {
            let pair = pair.trim();
            if let Some(eq) = pair.find('=').filter(|&i| i > 0) {
                node.attributes.push(XmlAttribute {
                    name: QName::parse(&pair[..eq]),
                    value: pair[eq + 1..].trim_matches(['"', '\'']).to_string(),
                    namespace_uri: String::new(),
                });
            }
        }

        if self.open.len() == 1 {
            self.seen_declaration = true;
        }
        self.append(node)
    }
}
