/// Base64 helpers for the FMD wire format.
///
/// The server emits standard-alphabet base64 and is inconsistent about `=`
/// padding, so decoding re-pads before handing off to the strict engine.
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

use crate::error::{FmdError, Result};

/// Append `=` until the length is a multiple of four.
pub fn pad_base64(s: &str) -> String {
    let mut out = s.to_string();
    let missing = (4 - out.len() % 4) % 4;
    out.extend(std::iter::repeat('=').take(missing));
    out
}

/// Decode base64 that may be missing its trailing padding.
pub fn decode_lenient(s: &str) -> Result<Vec<u8>> {
    let trimmed = s.trim();
    STANDARD
        .decode(pad_base64(trimmed.trim_end_matches('=')))
        .map_err(|e| FmdError::Decryption(format!("Invalid base64: {e}")))
}

pub fn encode_padded(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn encode_unpadded(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data)
}
