//! Continuation-cursor codec.
//!
//! The token is opaque to callers: a hex-encoded serde payload carrying
//! the `(updatedAt, id)` watermark a page ended on. This module owns only
//! the wire format; resume semantics live in the list path.

use crate::value::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

// Defensive decode bound for untrusted cursor token input.
const MAX_CURSOR_TOKEN_HEX_LEN: usize = 4 * 1024;

///
/// CursorDecodeError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum CursorDecodeError {
    #[error("cursor token is empty")]
    Empty,

    #[error("cursor token exceeds max length: {len} hex chars (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("cursor token must have an even number of hex characters")]
    OddLength,

    #[error("invalid hex character at position {position}")]
    InvalidHex { position: usize },

    #[error("cursor payload failed to decode")]
    Payload,
}

///
/// Watermark
///
/// The `(updatedAt, primaryKey)` position a page ended on; the next page
/// resumes strictly after it in the total list order.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Watermark {
    pub updated_at: Timestamp,
    pub id: String,
}

impl Watermark {
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing a two-field struct of primitives cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        encode_hex(&bytes)
    }

    pub fn decode(token: &str) -> Result<Self, CursorDecodeError> {
        let bytes = decode_hex(token)?;
        serde_json::from_slice(&bytes).map_err(|_| CursorDecodeError::Payload)
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn decode_hex(token: &str) -> Result<Vec<u8>, CursorDecodeError> {
    let token = token.trim();

    if token.is_empty() {
        return Err(CursorDecodeError::Empty);
    }
    if token.len() > MAX_CURSOR_TOKEN_HEX_LEN {
        return Err(CursorDecodeError::TooLong {
            len: token.len(),
            max: MAX_CURSOR_TOKEN_HEX_LEN,
        });
    }
    if token.len() % 2 != 0 {
        return Err(CursorDecodeError::OddLength);
    }

    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(token.len() / 2);
    for idx in (0..bytes.len()).step_by(2) {
        let hi = decode_hex_nibble(bytes[idx])
            .ok_or(CursorDecodeError::InvalidHex { position: idx + 1 })?;
        let lo = decode_hex_nibble(bytes[idx + 1])
            .ok_or(CursorDecodeError::InvalidHex { position: idx + 2 })?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

const fn decode_hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

///
/// TESTS
///
