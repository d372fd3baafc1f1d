//! Document parsing
//!
//! [`parse`] reads a whole document into an [`XmlDocument`]. The same
//! [`builder::TreeBuilder`] drives the streaming parser in
//! [`crate::strategy::streaming`], one event at a time.

pub(crate) mod builder;

use crate::dom::XmlDocument;
use crate::error::{Error, Result};
use crate::reader::DecoderOptions;
use builder::TreeBuilder;
use std::io::{BufRead, BufReader, Read};
use tracing::debug;

/// Options for [`parse_with_options`] and [`crate::StreamParser::with_options`]
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Tokenizer settings; `None` uses [`DecoderOptions::default`] (strict).
    pub decoder: Option<DecoderOptions>,
    /// Record the source line of every node in `XmlNode::line_number`.
    /// Only applies to whole-document parsing.
    pub with_line_numbers: bool,
}

impl ParserOptions {
    pub(crate) fn decoder_options(&self) -> DecoderOptions {
        self.decoder.clone().unwrap_or_default()
    }
}

/// Parse a complete document with default (strict) options.
pub fn parse<R: Read>(reader: R) -> Result<XmlDocument> {
    parse_with_options(reader, &ParserOptions::default())
}

pub fn parse_str(input: &str) -> Result<XmlDocument> {
    parse_with_options(input.as_bytes(), &ParserOptions::default())
}

pub fn parse_with_options<R: Read>(mut reader: R, options: &ParserOptions) -> Result<XmlDocument> {
    if options.with_line_numbers {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;
        let mut doc = build(&input[..], options)?;
        crate::lines::annotate(&mut doc, &input);
        return Ok(doc);
    }
    build(BufReader::new(reader), options)
}

fn build<R: BufRead>(reader: R, options: &ParserOptions) -> Result<XmlDocument> {
    let mut builder = TreeBuilder::new(reader, options.decoder_options());
    while builder.step()?.is_some() {}

    let doc = builder.into_document();
    // A well-formed document has at least one element.
    if doc.root_element_id().is_none() {
        return Err(Error::EmptyDocument);
    }
    debug!(nodes = doc.node_count(), "document parsed");
    Ok(doc)
}
