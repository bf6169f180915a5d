//! Canonical pre-images and SHA-256 digests for chunk chains.
//!
//! Two distinct encodings live here and must never be conflated:
//!
//! - [`BlockPreimage`] covers every logical block field except the signature
//!   and is the input to [`canonical_digest`], which links a block to its
//!   successor.
//! - [`SignedPreimage`] drops `deviceId` as well and is the exact byte string
//!   a device signs.
//!
//! Both encode as compact JSON objects with a fixed key order, so two
//! independent implementations produce byte-identical pre-images.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// `prevHash` value carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

/// Borrowed view of the fields that make up a block's canonical digest.
///
/// Field declaration order is the serialized key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPreimage<'a> {
    pub index: u64,
    pub chunk_hash: &'a str,
    pub sensor_fingerprint: &'a str,
    pub prev_hash: &'a str,
    pub timestamp: &'a str,
    pub device_id: &'a str,
}

/// Borrowed view of the fields a device signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPreimage<'a> {
    pub index: u64,
    pub chunk_hash: &'a str,
    pub sensor_fingerprint: &'a str,
    pub prev_hash: &'a str,
    pub timestamp: &'a str,
}

impl BlockPreimage<'_> {
    /// Canonical byte encoding used as the digest pre-image.
    pub fn encode(&self) -> Vec<u8> {
        // Integer and string fields only, so serialization cannot fail.
        serde_json::to_vec(self).expect("block pre-image serialization failed")
    }
}

impl SignedPreimage<'_> {
    /// Canonical byte encoding of the signed message.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("signed pre-image serialization failed")
    }
}

/// Digest that the successor of this block must carry as its `prevHash`.
pub fn canonical_digest(block: &BlockPreimage<'_>) -> String {
    sha256_hex(&block.encode())
}

/// Fingerprint of raw chunk content, comparable with a block's `chunkHash`.
pub fn content_fingerprint(content: &[u8]) -> String {
    sha256_hex(content)
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
