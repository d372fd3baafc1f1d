//! XML serialization of a subtree
//!
//! Writes nodes back to XML text:
//! - text is escaped (`& < > ' "`), whitespace collapsed unless preserved
//! - `xml:space="preserve"` / `"default"` on a node overrides the inherited
//!   setting for that node and its descendants
//! - CDATA sections, comments, declarations, PIs and directives keep their
//!   original form
//! - optional `<a/>` for childless elements and optional indentation

use super::document::XmlDocument;
use super::node::{NodeId, NodeKind, XmlNode};

/// Options for [`XmlDocument::output_xml_with_options`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Include the node itself, not just its children
    pub output_self: bool,
    /// Keep text content as is instead of trimming it
    pub preserve_spaces: bool,
    /// Write childless elements as `<a/>`
    pub empty_tag_support: bool,
    pub skip_comments: bool,
    /// Put each element on its own line, indented with this string
    pub indentation: Option<String>,
    /// Omit `<?xml ...?>` declaration nodes
    pub skip_declaration: bool,
}

impl OutputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_self(mut self) -> Self {
        self.output_self = true;
        self
    }

    pub fn with_preserve_spaces(mut self, preserve: bool) -> Self {
        self.preserve_spaces = preserve;
        self
    }

    pub fn with_empty_tag_support(mut self) -> Self {
        self.empty_tag_support = true;
        self
    }

    pub fn without_comments(mut self) -> Self {
        self.skip_comments = true;
        self
    }

    pub fn with_indentation(mut self, indent: impl Into<String>) -> Self {
        self.indentation = Some(indent.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.skip_declaration = !declaration;
        self
    }
}

/// Escape text the way HTML escaping does: `& < > ' "`. Newlines and tabs
/// pass through unchanged.
pub fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            _ => out.push(c),
        }
    }
}

/// Whether `xml:space` on `node` switches whitespace preservation
fn preserve_spaces(node: &XmlNode, inherited: bool) -> bool {
    match node.attr("xml:space") {
        Some("preserve") => true,
        Some("default") => false,
        _ => inherited,
    }
}

struct Writer<'a> {
    doc: &'a XmlDocument,
    options: &'a OutputOptions,
    out: String,
}

impl<'a> Writer<'a> {
    fn newline(&mut self, depth: usize) {
        if let Some(indent) = &self.options.indentation {
            if !self.out.is_empty() {
                self.out.push('\n');
                for _ in 0..depth {
                    self.out.push_str(indent);
                }
            }
        }
    }

    fn children(&mut self, id: NodeId, depth: usize, preserve: bool) {
        let doc = self.doc;
        for child in doc.children(id) {
            self.node(child, depth, preserve);
        }
    }

    fn node(&mut self, id: NodeId, depth: usize, preserve: bool) {
        let doc = self.doc;
        let Some(node) = doc.get_node(id) else {
            return;
        };
        let preserve = preserve_spaces(node, preserve);

        match node.kind {
            NodeKind::Document => self.children(id, depth, preserve),
            NodeKind::Text => {
                if preserve {
                    escape_text(&node.data, &mut self.out);
                } else {
                    escape_text(node.data.trim(), &mut self.out);
                }
            }
            NodeKind::CharData => {
                self.out.push_str("<![CDATA[");
                self.out.push_str(&node.data);
                self.out.push_str("]]>");
            }
            NodeKind::Comment => {
                if !self.options.skip_comments {
                    self.newline(depth);
                    self.out.push_str("<!--");
                    self.out.push_str(&node.data);
                    self.out.push_str("-->");
                }
            }
            NodeKind::Notation => {
                self.newline(depth);
                self.out.push_str("<!");
                self.out.push_str(&node.data);
                self.out.push('>');
            }
            NodeKind::Declaration => {
                if !self.options.skip_declaration {
                    self.newline(depth);
                    self.out.push_str("<?");
                    self.out.push_str(&node.data);
                    self.attributes(node);
                    self.out.push_str("?>");
                }
            }
            NodeKind::ProcessingInstruction => {
                self.newline(depth);
                self.out.push_str("<?");
                match &node.proc_inst {
                    Some(pi) => {
                        self.out.push_str(&pi.target);
                        if !pi.inst.is_empty() {
                            self.out.push(' ');
                            self.out.push_str(&pi.inst);
                        }
                    }
                    None => self.out.push_str(&node.data),
                }
                self.out.push_str("?>");
            }
            NodeKind::Element => self.element(id, node, depth, preserve),
            NodeKind::Attribute => escape_text(&node.data, &mut self.out),
        }
    }

    fn attributes(&mut self, node: &XmlNode) {
        for attr in &node.attributes {
            self.out.push(' ');
            self.out.push_str(&attr.name.qualified());
            self.out.push_str("=\"");
            escape_text(&attr.value, &mut self.out);
            self.out.push('"');
        }
    }

    fn element(&mut self, id: NodeId, node: &XmlNode, depth: usize, preserve: bool) {
        let name = node.name();
        self.newline(depth);
        self.out.push('<');
        self.out.push_str(&name);
        self.attributes(node);

        if node.first_child.is_none() && self.options.empty_tag_support {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');
        self.children(id, depth + 1, preserve);
        if self.ends_with_block(id) {
            self.newline(depth);
        }
        self.out.push_str("</");
        self.out.push_str(&name);
        self.out.push('>');
    }

    /// With indentation, the closing tag goes on its own line unless the
    /// element is empty or ends in text.
    fn ends_with_block(&self, id: NodeId) -> bool {
        if self.options.indentation.is_none() {
            return false;
        }
        match self.doc.last_child(id).and_then(|c| self.doc.get_node(c)) {
            None => false,
            Some(last) if last.is_text() => last.data.trim().is_empty(),
            Some(_) => true,
        }
    }
}

impl XmlDocument {
    /// Serialize a node's children, or the node itself when `self_` is set.
    pub fn output_xml(&self, id: NodeId, self_: bool) -> String {
        let mut options = OutputOptions::new();
        options.output_self = self_;
        self.output_xml_with_options(id, &options)
    }

    pub fn output_xml_with_options(&self, id: NodeId, options: &OutputOptions) -> String {
        let mut writer = Writer {
            doc: self,
            options,
            out: String::new(),
        };
        let Some(node) = self.get_node(id) else {
            return writer.out;
        };

        if options.output_self && node.kind != NodeKind::Document {
            writer.node(id, 0, options.preserve_spaces);
        } else {
            let preserve = preserve_spaces(node, options.preserve_spaces);
            writer.children(id, 0, preserve);
        }
        writer.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::QName;
    use crate::dom::XmlAttribute;

    fn sample() -> (XmlDocument, NodeId) {
        let mut doc = XmlDocument::new();
        let root = doc.create_node(XmlNode::element("root"));
        doc.add_child(XmlDocument::DOCUMENT, root);
        let text = doc.create_node(XmlNode::text("  a < b  "));
        doc.add_child(root, text);
        let empty = doc.create_node(XmlNode::element("empty"));
        doc.add_child(root, empty);
        (doc, root)
    }

    #[test]
    fn test_escape_text() {
        let mut out = String::new();
        escape_text("If a<b & b>c, it's \"so\"\n\t", &mut out);
        assert_eq!(out, "If a&lt;b &amp; b&gt;c, it&#39;s &#34;so&#34;\n\t");
    }

    #[test]
    fn test_output_self_and_children() {
        let (doc, root) = sample();
        assert_eq!(doc.output_xml(root, true), "<root>a &lt; b<empty></empty></root>");
        assert_eq!(doc.output_xml(root, false), "a &lt; b<empty></empty>");
        assert_eq!(
            doc.output_xml_with_options(
                root,
                &OutputOptions::new().with_output_self().with_preserve_spaces(true)
            ),
            "<root>  a &lt; b  <empty></empty></root>"
        );
    }

    #[test]
    fn test_empty_tag_support() {
        let (doc, root) = sample();
        let options = OutputOptions::new().with_output_self().with_empty_tag_support();
        assert_eq!(
            doc.output_xml_with_options(root, &options),
            "<root>a &lt; b<empty/></root>"
        );
    }

    #[test]
    fn test_xml_space_attribute() {
        let (mut doc, root) = sample();
        doc.get_node_mut(root).unwrap().attributes.push(XmlAttribute {
            name: QName::new("xml", "space"),
            value: "preserve".into(),
            namespace_uri: crate::dom::namespace::ns::XML.into(),
        });
        assert_eq!(doc.output_xml(root, false), "  a &lt; b  <empty></empty>");
        assert_eq!(
            doc.output_xml(root, true),
            "<root xml:space=\"preserve\">  a &lt; b  <empty></empty></root>"
        );
    }

    #[test]
    fn test_special_nodes() {
        let mut doc = XmlDocument::new();
        let decl = doc.create_node(XmlNode::new(NodeKind::Declaration, "xml"));
        doc.add_attr(decl, "version", "1.0");
        doc.add_child(XmlDocument::DOCUMENT, decl);
        let notation = doc.create_node(XmlNode::new(NodeKind::Notation, "DOCTYPE a"));
        doc.add_child(XmlDocument::DOCUMENT, notation);
        let a = doc.create_node(XmlNode::element("a"));
        doc.add_child(XmlDocument::DOCUMENT, a);
        let comment = doc.create_node(XmlNode::new(NodeKind::Comment, " c "));
        doc.add_child(a, comment);
        let cdata = doc.create_node(XmlNode::new(NodeKind::CharData, "<x>"));
        doc.add_child(a, cdata);

        assert_eq!(
            doc.output_xml(XmlDocument::DOCUMENT, false),
            "<?xml version=\"1.0\"?><!DOCTYPE a><a><!-- c --><![CDATA[<x>]]></a>"
        );
        let options = OutputOptions::new().without_comments().with_declaration(false);
        assert_eq!(
            doc.output_xml_with_options(XmlDocument::DOCUMENT, &options),
            "<!DOCTYPE a><a><![CDATA[<x>]]></a>"
        );
    }

    #[test]
    fn test_indentation() {
        let mut doc = XmlDocument::new();
        let d = doc.create_node(XmlNode::element("d"));
        doc.add_child(XmlDocument::DOCUMENT, d);
        let e = doc.create_node(XmlNode::element("e"));
        doc.add_child(d, e);
        let t = doc.create_node(XmlNode::text("hello world"));
        doc.add_child(e, t);
        let options = OutputOptions::new().with_indentation("\t");
        assert_eq!(
            doc.output_xml_with_options(XmlDocument::DOCUMENT, &options),
            "<d>\n\t<e>hello world</e>\n</d>"
        );
    }
}
