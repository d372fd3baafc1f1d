//! Pretty-printing
//!
//! Indented output on top of the serializer: one element per line,
//! whitespace-only text dropped, elements holding only text kept inline.

use crate::dom::{NodeId, OutputOptions, XmlDocument};
use crate::error::Result;
use crate::parser::parse_str;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Repeated once per nesting level; empty disables line breaks
    pub indent: String,
    /// Write the `<?xml ...?>` declaration
    pub declaration: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            indent: "\t".to_string(),
            declaration: true,
        }
    }
}

impl FormatOptions {
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    fn output_options(&self) -> OutputOptions {
        OutputOptions::new()
            .with_output_self()
            .with_indentation(self.indent.clone())
            .with_declaration(self.declaration)
    }
}

/// Format the subtree at `id`; the document node formats the whole tree.
pub fn format(doc: &XmlDocument, id: NodeId, options: &FormatOptions) -> String {
    doc.output_xml_with_options(id, &options.output_options())
}

/// Parse `xml` and format the whole document.
pub fn format_str(xml: &str, options: &FormatOptions) -> Result<String> {
    let doc = parse_str(xml)?;
    Ok(format(&doc, XmlDocument::DOCUMENT, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_without_declaration() {
        let options = FormatOptions::default().with_declaration(false);
        assert_eq!(
            format_str("<d><e>hello world</e></d>", &options).unwrap(),
            "<d>\n\t<e>hello world</e>\n</d>"
        );
    }

    #[test]
    fn test_format_with_declaration() {
        let out = format_str("<d>\n  <e>hello</e>\n  <f/>\n</d>", &FormatOptions::default()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\"?>\n<d>\n\t<e>hello</e>\n\t<f></f>\n</d>"
        );
    }

    #[test]
    fn test_format_subtree() {
        let doc = parse_str("<a><b><c>x</c></b></a>").unwrap();
        let a = doc.root_element_id().unwrap();
        let b = doc.first_child(a).unwrap();
        let options = FormatOptions::default().with_indent("  ");
        assert_eq!(format(&doc, b, &options), "<b>\n  <c>x</c>\n</b>");
    }

    #[test]
    fn test_format_invalid_input() {
        assert!(format_str("<a>", &FormatOptions::default()).is_err());
    }
}
