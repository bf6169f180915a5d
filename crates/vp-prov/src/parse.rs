//! Conversion of untrusted JSON into typed blocks.

use crate::types::Block;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Input that could not be turned into the expected shape.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("claim must be an array of blocks")]
    NotAnArray,

    #[error("claim cannot be empty")]
    EmptyClaim,

    #[error("invalid block at position {position}: {source}")]
    InvalidBlock {
        position: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("device id cannot be empty")]
    EmptyDeviceId,

    #[error("public key must be {expected} bytes of hex: {reason}")]
    InvalidPublicKey { expected: usize, reason: String },
}

/// Parse one block from a JSON value.
pub fn block_from_value(value: &Value) -> Result<Block, serde_json::Error> {
    Block::deserialize(value)
}

/// Parse one block from raw JSON bytes.
pub fn parse_block(bytes: &[u8]) -> Result<Block, ValidationError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Parse a claim: a non-empty JSON array of blocks.
///
/// Errors name the array position of the first block that fails to parse.
pub fn parse_claim(bytes: &[u8]) -> Result<Vec<Block>, ValidationError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(items) = value else {
        return Err(ValidationError::NotAnArray);
    };
    if items.is_empty() {
        return Err(ValidationError::EmptyClaim);
    }
    items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            block_from_value(item)
                .map_err(|source| ValidationError::InvalidBlock { position, source })
        })
        .collect()
}

/// Check a device registration request before it reaches the store.
pub fn validate_registration(
    device_id: &str,
    public_key_hex: &str,
) -> Result<(), ValidationError> {
    if device_id.is_empty() {
        return Err(ValidationError::EmptyDeviceId);
    }
    let expected = crate::signature::PUBLIC_KEY_LEN;
    let bytes = hex::decode(public_key_hex).map_err(|e| ValidationError::InvalidPublicKey {
        expected,
        reason: e.to_string(),
    })?;
    if bytes.len() != expected {
        return Err(ValidationError::InvalidPublicKey {
            expected,
            reason: format!("got {} bytes", bytes.len()),
        });
    }
    Ok(())
}
