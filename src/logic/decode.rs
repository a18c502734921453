//! Image Decoder - base64 transport layer
//!
//! Turns the `image` field of a request into raw bytes. Failures here are
//! always the caller's fault and are kept separate from image parsing errors.

use std::borrow::Cow;

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// Prefix marker of a `data:` URL carrying base64 content
const DATA_URL_MARKER: &str = ";base64,";

/// Malformed base64 (bad alphabet, bad padding, bad length)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DecodeError(#[from] base64::DecodeError);

/// Decode a standard-alphabet base64 string into raw bytes.
///
/// ASCII whitespace is ignored and a leading `data:<mime>;base64,` prefix is
/// stripped, so payloads pasted from browsers or `base64` CLI output work as-is.
pub fn decode(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = strip_data_url(encoded.trim());

    let payload: Cow<'_, str> = if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(payload.chars().filter(|c| !c.is_ascii_whitespace()).collect())
    } else {
        Cow::Borrowed(payload)
    };

    Ok(STANDARD.decode(payload.as_bytes())?)
}

/// Encode raw bytes as standard base64 (inverse of [`decode`])
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn strip_data_url(input: &str) -> &str {
    if !input.starts_with("data:") {
        return input;
    }

    match input.find(DATA_URL_MARKER) {
        Some(idx) => &input[idx + DATA_URL_MARKER.len()..],
        None => input,
    }
}
