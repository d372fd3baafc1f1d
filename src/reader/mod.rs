//! XML Reader Module
//!
//! Turns the raw token stream into namespace-aware events:
//! - Events: element names split into namespace URI and local part
//! - Decoder: scope tracking, well-formedness checks, tolerant repairs

pub mod decoder;
pub mod events;

pub use decoder::{Decoder, DecoderOptions};
pub use events::{Attr, Name, XmlEvent};
