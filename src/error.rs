//! Error types
//!
//! Every fallible public operation returns [`Result`]. Lower layers (the
//! XPath lexer/parser/evaluator) report plain `String` messages which are
//! wrapped here together with the expression that produced them.

use thiserror::Error;

/// A tokenization or decoding error with its position in the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("XML syntax error on line {line}: {message}")]
pub struct ParseError {
    pub message: String,
    /// 1-based line of the byte that triggered the error
    pub line: usize,
    /// Byte offset from the start of the input
    pub position: usize,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("invalid XML document, namespace {0} is missing")]
    MissingNamespace(String),

    #[error("invalid XML document")]
    EmptyDocument,

    #[error("invalid stream element xpath '{expr}': {message}")]
    InvalidStreamTarget { expr: String, message: String },

    #[error("invalid stream filter xpath '{expr}': {message}")]
    InvalidStreamFilter { expr: String, message: String },

    #[error("invalid xpath '{expr}': {message}")]
    XPath { expr: String, message: String },

    #[error("invalid XML document({0})")]
    InvalidContentType(String),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn xpath(expr: &str, message: impl Into<String>) -> Self {
        Error::XPath {
            expr: expr.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::MissingNamespace("http://x".into()).to_string(),
            "invalid XML document, namespace http://x is missing"
        );
        assert_eq!(Error::EmptyDocument.to_string(), "invalid XML document");
        assert_eq!(
            Error::InvalidContentType("text/html; charset=utf-8".into()).to_string(),
            "invalid XML document(text/html; charset=utf-8)"
        );
        let err = Error::InvalidStreamTarget {
            expr: "[invalid".into(),
            message: "expression must evaluate to a node-set".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid stream element xpath '[invalid': expression must evaluate to a node-set"
        );
    }

    #[test]
    fn test_syntax_error_display() {
        let err = Error::from(ParseError {
            message: "unexpected EOF".into(),
            line: 3,
            position: 42,
        });
        assert_eq!(err.to_string(), "XML syntax error on line 3: unexpected EOF");
    }
}
