//! Base64 encoding and decoding of bytes, text and byte sources.
//!
//! Encoding uses the standard alphabet with padding and no line breaks.
//! Decoding follows the MIME convention of ignoring line breaks and other
//! whitespace inside the input.

use crate::body::ByteSource;
use crate::charset;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encodes data as Base64.
#[must_use]
pub fn encode_bytes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, skipping whitespace.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the input is not valid Base64.
pub fn decode_bytes(data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .as_ref()
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| Error::Decode(e.to_string()))
}

/// Encodes text in `charset` (UTF-8 when absent), then as Base64.
pub fn encode_text(text: &str, charset: Option<&str>) -> Result<String> {
    Ok(encode_bytes(&charset::encode_text(text, charset)?))
}

/// Decodes Base64, then interprets the bytes in `charset` (UTF-8 when absent).
pub fn decode_text(content: &str, charset: Option<&str>) -> Result<String> {
    charset::decode_text(&decode_bytes(content)?, charset)
}

/// Reads `source` to the end and returns its Base64 encoding as a new source.
///
/// `source` is closed on every path.
pub async fn encode_byte_source(source: ByteSource) -> Result<ByteSource> {
    let data = source.read_all().await?;
    Ok(ByteSource::from_bytes(encode_bytes(&data)))
}

/// Reads `source` to the end and returns the decoded bytes as a new source.
///
/// `source` is closed on every path.
pub async fn decode_byte_source(source: ByteSource) -> Result<ByteSource> {
    let data = source.read_all().await?;
    Ok(ByteSource::from_bytes(decode_bytes(data)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(encode_bytes(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_bytes("SGVsbG8sIFdvcmxkIQ==").unwrap(), b"Hello, World!");
        assert_eq!(decode_bytes("SGVsbG8s\r\nIFdvcmxk\r\nIQ==").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_bytes("not*base64"), Err(Error::Decode(_))));
        assert!(matches!(decode_bytes("SGVsbG8"), Err(Error::Decode(_))));
    }

    #[test]
    fn test_text_with_charset() {
        let encoded = encode_text("café", Some("ISO-8859-1")).unwrap();
        assert_eq!(encoded, "Y2Fm6Q==");
        assert_eq!(decode_text(&encoded, Some("ISO-8859-1")).unwrap(), "café");
        assert!(matches!(decode_text(&encoded, None), Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_byte_sources() {
        let encoded = encode_byte_source(ByteSource::from_bytes("Ballerina binary file part"))
            .await
            .unwrap();
        let decoded = decode_byte_source(encoded).await.unwrap();
        assert_eq!(decoded.read_all().await.unwrap(), b"Ballerina binary file part");

        let err = decode_byte_source(ByteSource::from_bytes("@@@")).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
