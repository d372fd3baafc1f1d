//! Core XML parsing primitives
//!
//! - CachedReader: buffered byte source that can record the raw bytes of
//!   the token being read
//! - Tokenizer: byte-level state machine producing raw tokens
//! - Entities: entity and character reference decoding

pub mod cached_reader;
pub mod entities;
pub mod tokenizer;
