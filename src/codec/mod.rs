//! Transaction envelope codec.
//!
//! The core node stores transactions as a self-describing binary envelope:
//! a 2-byte little-endian format tag followed by the content bytes. The
//! gateway never interprets the content; it only re-encodes the envelope
//! for the HTTP boundary, where payloads travel as base64 text with the
//! format header stripped (the header is storage metadata, not content).
//!
//! The codec is deliberately lossy with respect to header bytes:
//! `decode(encode(x))` preserves content exactly but re-tags the record
//! with the default format.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{GatewayError, GatewayResult};

/// Format tag for records constructed at this boundary.
pub const FORMAT_DEFAULT: u16 = 1;

/// Length of the native envelope's format header.
const HEADER_LEN: usize = 2;

/// One transaction in the core's native envelope form.
///
/// `content` is opaque to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Storage format tag from the native header.
    pub format: u16,
    /// Self-describing transaction bytes.
    pub content: Vec<u8>,
}

impl TransactionRecord {
    /// Wrap content bytes with the default format tag.
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            format: FORMAT_DEFAULT,
            content,
        }
    }

    /// Parse a native envelope: 2-byte little-endian format tag, then
    /// content. Anything shorter than the header is malformed.
    pub fn from_native(bytes: &[u8]) -> GatewayResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(GatewayError::MalformedEncoding(format!(
                "native envelope truncated: {} bytes",
                bytes.len()
            )));
        }
        let format = u16::from_le_bytes([bytes[0], bytes[1]]);
        Ok(Self {
            format,
            content: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize back to the native envelope form.
    pub fn to_native(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.content.len());
        out.extend_from_slice(&self.format.to_le_bytes());
        out.extend_from_slice(&self.content);
        out
    }
}

/// Decode a text-safe payload from the HTTP boundary into a record.
///
/// The boundary encoding is header-stripped, so the result carries the
/// default format tag.
pub fn decode(wire_text: &str) -> GatewayResult<TransactionRecord> {
    let content = BASE64
        .decode(wire_text)
        .map_err(|e| GatewayError::MalformedEncoding(e.to_string()))?;
    Ok(TransactionRecord::new(content))
}

/// Encode a record for the HTTP boundary: base64 over the content bytes
/// only, header stripped.
pub fn encode(record: &TransactionRecord) -> String {
    BASE64.encode(&record.content)
}

/// Re-encode a native envelope straight to the boundary form.
pub fn encode_native(bytes: &[u8]) -> GatewayResult<String> {
    Ok(encode(&TransactionRecord::from_native(bytes)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encode_preserves_content() {
        let record = TransactionRecord::new(vec![1, 2, 3, 250]);
        let wire = encode(&record);
        let back = decode(&wire).unwrap();
        assert_eq!(back.content, record.content);
    }

    #[test]
    fn test_header_is_not_round_tripped() {
        let record = TransactionRecord {
            format: 7,
            content: vec![42; 8],
        };
        let back = decode(&encode(&record)).unwrap();
        assert_eq!(back.content, record.content);
        assert_eq!(back.format, FORMAT_DEFAULT);
    }

    #[test]
    fn test_native_round_trip() {
        let record = TransactionRecord {
            format: 3,
            content: vec![9, 8, 7],
        };
        let native = record.to_native();
        assert_eq!(&native[..2], &3u16.to_le_bytes());
        assert_eq!(TransactionRecord::from_native(&native).unwrap(), record);
    }

    #[test]
    fn test_truncated_native_envelope() {
        assert!(matches!(
            TransactionRecord::from_native(&[1]),
            Err(GatewayError::MalformedEncoding(_))
        ));
        // Exactly a header with empty content is valid.
        let empty = TransactionRecord::from_native(&[1, 0]).unwrap();
        assert!(empty.content.is_empty());
    }

    #[test]
    fn test_decode_rejects_invalid_characters() {
        assert!(matches!(
            decode("not!!valid@@base64"),
            Err(GatewayError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        // A lone base64 character cannot form a quantum.
        assert!(matches!(
            decode("A"),
            Err(GatewayError::MalformedEncoding(_))
        ));
    }
}
