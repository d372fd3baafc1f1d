//! xmlstream - XML tree building, path queries and filtered streaming
//!
//! Modes:
//! - Whole document: [`parse`] builds an arena [`XmlDocument`]
//! - Streaming: [`StreamParser`] yields only the elements matching a path
//!   expression and prunes the tree behind them
//! - Queries: XPath 1.0 over any node ([`query`], [`query_all`],
//!   [`evaluate`]), with a process-wide cache of compiled expressions
//! - Parallel: many expressions over one tree ([`evaluate_parallel`])
//!
//! ```
//! use xmlstream::{parse_str, query_all, XmlDocument};
//!
//! let doc = parse_str("<list><item>a</item><item>b</item></list>").unwrap();
//! let items = query_all(&doc, XmlDocument::DOCUMENT, "//item").unwrap();
//! assert_eq!(items.len(), 2);
//! ```
//!
//! The library logs through `tracing` and installs no subscriber.

pub mod core;
pub mod dom;
pub mod error;
pub mod format;
pub mod http;
pub mod lines;
pub mod memory;
pub mod parser;
pub mod query;
pub mod reader;
pub mod strategy;
pub mod xpath;

pub use dom::{NodeId, NodeKind, OutputOptions, QName, XmlAttribute, XmlDocument, XmlNode};
pub use error::{Error, ParseError, Result};
pub use format::{format, format_str, FormatOptions};
pub use http::is_xml_content_type;
#[cfg(feature = "http")]
pub use http::{load_url, load_url_with_line_numbers};
pub use lines::parse_with_line_numbers;
pub use parser::{parse, parse_str, parse_with_options, ParserOptions};
pub use query::{
    compile, evaluate, find_each, find_each_with_break, query, query_all, query_selector,
    query_selector_all, set_selector_cache_enabled, set_selector_cache_max_entries,
};
pub use reader::DecoderOptions;
pub use strategy::{evaluate_parallel, xmap, xpath_map, StreamParser};
pub use xpath::{CompiledExpr, XPathNode, XPathValue};
