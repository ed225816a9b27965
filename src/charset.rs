//! Charset-aware conversion between bytes and text.
//!
//! Charset labels are resolved with `encoding_rs`, so the usual aliases
//! (`latin1`, `utf8`, `ISO-8859-1`, ...) are understood. An absent charset
//! means UTF-8.

use crate::error::{Error, Result};
use encoding_rs::{Encoding, UTF_8};

fn lookup(charset: Option<&str>) -> Option<&'static Encoding> {
    match charset {
        Some(label) => Encoding::for_label(label.trim().as_bytes()),
        None => Some(UTF_8),
    }
}

/// Decodes bytes in the given charset.
///
/// Malformed input is an error rather than being replaced with U+FFFD.
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<String> {
    let encoding = lookup(charset)
        .ok_or_else(|| Error::Decode(format!("unsupported charset: {}", charset.unwrap_or_default())))?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| Error::Decode(format!("input is not valid {}", encoding.name())))
}

/// Encodes text in the given charset.
pub fn encode_text(text: &str, charset: Option<&str>) -> Result<Vec<u8>> {
    let encoding = lookup(charset)
        .ok_or_else(|| Error::Encoding(format!("unsupported charset: {}", charset.unwrap_or_default())))?;
    let (bytes, used, unmappable) = encoding.encode(text);
    if unmappable {
        return Err(Error::Encoding(format!(
            "text is not representable in {}",
            used.name()
        )));
    }
    Ok(bytes.into_owned())
}
