//! XML Entity Decoding
//!
//! Handles decoding of entity references in text and attribute values:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//! - Caller-supplied entities (`DecoderOptions::entity`)
//!
//! Line endings (`\r\n` and a lone `\r`) are normalized to `\n` first.
//!
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;
use std::collections::HashMap;

/// Normalize `\r\n` and a lone `\r` to `\n`. Runs on raw bytes, before
/// entity decoding, so a `&#13;` reference still yields `\r`.
pub fn normalize_newlines(input: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'\r', input).is_none() {
        return Cow::Borrowed(input);
    }

    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;
    while let Some(off) = memchr(b'\r', &input[pos..]) {
        result.extend_from_slice(&input[pos..pos + off]);
        result.push(b'\n');
        pos += off + 1;
        if input.get(pos) == Some(&b'\n') {
            pos += 1;
        }
    }
    result.extend_from_slice(&input[pos..]);
    Cow::Owned(result)
}

/// Decode entity references.
///
/// In strict mode an unknown entity or a bare `&` is an error; otherwise it is
/// kept literally.
pub fn decode_entities<'a>(
    input: &'a [u8],
    custom: &HashMap<String, String>,
    strict: bool,
) -> Result<Cow<'a, [u8]>, String> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input).is_none() {
        return Ok(Cow::Borrowed(input));
    }

    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;

    while pos < input.len() {
        let Some(amp_pos) = memchr(b'&', &input[pos..]) else {
            result.extend_from_slice(&input[pos..]);
            break;
        };
        result.extend_from_slice(&input[pos..pos + amp_pos]);
        pos += amp_pos;

        let semi = memchr(b';', &input[pos..]).filter(|&off| is_entity_name(&input[pos + 1..pos + off]));
        match semi {
            Some(semi_offset) => {
                let entity = &input[pos + 1..pos + semi_offset];
                match decode_entity(entity, custom) {
                    Some(decoded) => {
                        result.extend_from_slice(decoded.as_bytes());
                        pos += semi_offset + 1;
                    }
                    None if strict => {
                        return Err(format!(
                            "invalid character entity &{};",
                            String::from_utf8_lossy(entity)
                        ));
                    }
                    None => {
                        // Unknown entity, keep as-is
                        result.push(b'&');
                        pos += 1;
                    }
                }
            }
            None if strict => {
                return Err("invalid character entity & (no semicolon)".to_string());
            }
            None => {
                result.push(b'&');
                pos += 1;
            }
        }
    }

    Ok(Cow::Owned(result))
}

fn is_entity_name(entity: &[u8]) -> bool {
    !entity.is_empty()
        && entity
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'#' | b'_' | b'-' | b'.' | b':') || b >= 0x80)
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8], custom: &HashMap<String, String>) -> Option<String> {
    if entity.is_empty() {
        return None;
    }

    // Numeric character reference
    if entity[0] == b'#' {
        return decode_numeric_entity(&entity[1..]);
    }

    match entity {
        b"lt" => Some("<".to_string()),
        b"gt" => Some(">".to_string()),
        b"amp" => Some("&".to_string()),
        b"quot" => Some("\"".to_string()),
        b"apos" => Some("'".to_string()),
        _ => std::str::from_utf8(entity)
            .ok()
            .and_then(|name| custom.get(name))
            .cloned(),
    }
}

/// Decode a numeric character reference, rejecting code points that are not
/// XML characters.
fn decode_numeric_entity(entity: &[u8]) -> Option<String> {
    if entity.is_empty() {
        return None;
    }

    let codepoint = if entity[0] == b'x' {
        // Hexadecimal: &#xHHHH;
        let hex = std::str::from_utf8(&entity[1..]).ok()?;
        u32::from_str_radix(hex, 16).ok()?
    } else {
        // Decimal: &#DDDD;
        let dec = std::str::from_utf8(entity).ok()?;
        dec.parse::<u32>().ok()?
    };

    if !is_valid_xml_char(codepoint) {
        return None;
    }

    char::from_u32(codepoint).map(|c| c.to_string())
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}
