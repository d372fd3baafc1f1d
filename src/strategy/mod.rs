//! Parsing Strategy Module
//!
//! - Streaming: pull matching elements out of a large document while
//!   pruning the tree behind them
//! - Parallel: evaluate many queries over one tree

pub mod parallel;
pub mod streaming;

pub use parallel::{evaluate_parallel, xmap, xpath_map};
pub use streaming::StreamParser;
