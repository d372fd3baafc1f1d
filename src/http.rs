//! Loading documents over HTTP
//!
//! Only responses whose `Content-Type` names an XML media type are parsed;
//! anything else fails with [`Error::InvalidContentType`] before the body is
//! read. The fetch itself needs the `http` feature.

use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "http")]
use crate::dom::XmlDocument;
#[cfg(feature = "http")]
use crate::error::{Error, Result};
#[cfg(feature = "http")]
use tracing::debug;

static XML_MIME: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)((application|image|message|model)/((\w|\.|-)+\+?)?|text/)(wb)?xml").ok()
});

/// Whether a `Content-Type` header value denotes XML: `text/*xml`,
/// `application/xml`, or an `application|image|message|model` subtype
/// ending in `+xml`. Parameters such as `charset` are ignored.
pub fn is_xml_content_type(content_type: &str) -> bool {
    XML_MIME
        .as_ref()
        .is_some_and(|re| re.is_match(content_type))
}

/// Fetch `url` and parse the response body.
#[cfg(feature = "http")]
pub fn load_url(url: &str) -> Result<XmlDocument> {
    let response = fetch(url)?;
    crate::parser::parse(response)
}

/// Like [`load_url`], recording source line numbers.
#[cfg(feature = "http")]
pub fn load_url_with_line_numbers(url: &str) -> Result<XmlDocument> {
    let response = fetch(url)?;
    crate::lines::parse_with_line_numbers(response)
}

#[cfg(feature = "http")]
fn fetch(url: &str) -> Result<reqwest::blocking::Response> {
    debug!(url, "fetching document");
    let response = reqwest::blocking::get(url)?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !is_xml_content_type(&content_type) {
        return Err(Error::InvalidContentType(content_type));
    }
    debug!(url, content_type = %content_type, status = %response.status(), "document fetched");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_content_types() {
        for ct in [
            "application/xml",
            "text/xml; charset=utf-8",
            "application/rss+xml",
            "image/svg+xml",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet+xml",
            "TEXT/XML",
        ] {
            assert!(is_xml_content_type(ct), "{}", ct);
        }
    }

    #[test]
    fn test_non_xml_content_types() {
        for ct in ["application/json", "text/html", "", "image/png"] {
            assert!(!is_xml_content_type(ct), "{}", ct);
        }
    }
}
