//! XPath 1.0 Engine
//!
//! XPath 1.0 over the document arena with:
//! - All 13 axes (namespace nodes are not modelled)
//! - The core function library
//! - Compiled expression caching

pub mod axes;
pub mod cache;
pub mod compiler;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use compiler::{compile, CompiledExpr};
pub use eval::evaluate;
pub use value::{XPathNode, XPathValue};
