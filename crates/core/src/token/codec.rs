//! Compact token decoding
//!
//! Splits a `header.payload.signature` token and decodes the payload into
//! [`Claims`]. The signature is never inspected.

use super::Claims;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;
use thiserror::Error;

/// Standard alphabet with optional padding, matching a browser's `atob`.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Errors produced while decoding a token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The token is not three non-empty dot-separated segments
    #[error("token must have three non-empty segments")]
    MalformedFormat,

    /// The payload segment is not base64-encoded JSON claims
    #[error("payload could not be parsed: {0}")]
    ParsingFailed(String),
}

/// Decode the payload segment of a compact token
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let payload = payload_segment(token)?;

    // URL-safe characters are mapped onto the standard alphabet first
    let normalized: String = payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE
        .decode(normalized.as_bytes())
        .map_err(|e| DecodeError::ParsingFailed(format!("invalid base64: {e}")))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| DecodeError::ParsingFailed(format!("invalid JSON: {e}")))?;
    if !value.is_object() {
        return Err(DecodeError::ParsingFailed(
            "payload is not a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| DecodeError::ParsingFailed(format!("invalid claims: {e}")))
}

fn payload_segment(token: &str) -> Result<&str, DecodeError> {
    let mut segments = token.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok(payload)
        }
        _ => Err(DecodeError::MalformedFormat),
    }
}
