//! Chain data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vp_hash::{canonical_digest, BlockPreimage, SignedPreimage, GENESIS_PREV_HASH};

/// A capture device allowed to sign blocks.
///
/// Registered once and never updated; there is no key rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Unique identifier, the registry's primary key
    pub device_id: String,

    /// Ed25519 public key, hex-encoded (32 bytes)
    pub public_key: String,

    /// When the device was registered
    pub registered_at: DateTime<Utc>,
}

/// One signed content chunk on the chain.
///
/// Blocks serialize with the camelCase field names used by the persisted
/// chain (`chunkHash`, `prevHash`, ...). Unknown keys are ignored on input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Position in the chain, starting at 0
    pub index: u64,

    /// SHA-256 of the chunk content (lowercase hex)
    pub chunk_hash: String,

    /// Opaque sensor description reported by the device
    pub sensor_fingerprint: String,

    /// Canonical digest of the predecessor, or `"0"` for genesis
    pub prev_hash: String,

    /// ISO-8601 capture time, kept verbatim because it is signed
    pub timestamp: String,

    /// Ed25519 signature over the signed message, hex-encoded
    pub signature: String,

    /// Device that produced and signed the block
    pub device_id: String,
}

impl Block {
    /// Digest pre-image: every field except `signature`.
    pub fn preimage(&self) -> BlockPreimage<'_> {
        BlockPreimage {
            index: self.index,
            chunk_hash: &self.chunk_hash,
            sensor_fingerprint: &self.sensor_fingerprint,
            prev_hash: &self.prev_hash,
            timestamp: &self.timestamp,
            device_id: &self.device_id,
        }
    }

    /// The message a device signs: the digest pre-image minus `deviceId`.
    pub fn signed_preimage(&self) -> SignedPreimage<'_> {
        SignedPreimage {
            index: self.index,
            chunk_hash: &self.chunk_hash,
            sensor_fingerprint: &self.sensor_fingerprint,
            prev_hash: &self.prev_hash,
            timestamp: &self.timestamp,
        }
    }

    /// Canonical digest, the value a successor carries as `prev_hash`.
    pub fn digest(&self) -> String {
        canonical_digest(&self.preimage())
    }

    /// Whether this block claims to start the chain.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Compare every field except `signature` against `other`.
    ///
    /// Returns the first differing field as `(name, ours, theirs)`.
    pub fn first_mismatch(&self, other: &Block) -> Option<(&'static str, String, String)> {
        if self.index != other.index {
            return Some(("index", self.index.to_string(), other.index.to_string()));
        }
        let fields: [(&'static str, &str, &str); 5] = [
            ("chunkHash", self.chunk_hash.as_str(), other.chunk_hash.as_str()),
            (
                "sensorFingerprint",
                self.sensor_fingerprint.as_str(),
                other.sensor_fingerprint.as_str(),
            ),
            ("prevHash", self.prev_hash.as_str(), other.prev_hash.as_str()),
            ("timestamp", self.timestamp.as_str(), other.timestamp.as_str()),
            ("deviceId", self.device_id.as_str(), other.device_id.as_str()),
        ];
        fields
            .into_iter()
            .find(|(_, a, b)| a != b)
            .map(|(name, a, b)| (name, a.to_string(), b.to_string()))
    }
}

/// Index of the block that would follow `last`, or `None` if the tail index
/// is already `u64::MAX`.
pub fn next_index(last: Option<&Block>) -> Option<u64> {
    match last {
        Some(block) => block.index.checked_add(1),
        None => Some(0),
    }
}

/// The `prev_hash` a block at the tail of `last` must carry.
pub fn expected_prev_hash(last: Option<&Block>) -> String {
    match last {
        Some(block) => block.digest(),
        None => GENESIS_PREV_HASH.to_string(),
    }
}

/// Outcome of verifying content against a claimed chain fragment.
///
/// Every check is always computed; detail strings are diagnostic only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub frame_hash_match: bool,
    pub frame_hash_details: String,
    pub chain_continuity: bool,
    pub chain_continuity_details: String,
    pub signature_validity: bool,
    pub signature_validity_details: String,
    pub sensor_fingerprint_validity: bool,
    pub sensor_fingerprint_details: String,
    pub overall_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_block() -> Block {
        Block {
            index: 1,
            chunk_hash: "aa".repeat(32),
            sensor_fingerprint: "sensor-x".to_string(),
            prev_hash: "bb".repeat(32),
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
            signature: "cc".repeat(64),
            device_id: "cam-1".to_string(),
        }
    }

    #[test]
    fn test_block_serializes_camel_case() {
        let json = serde_json::to_value(make_block()).unwrap();
        for key in [
            "index",
            "chunkHash",
            "sensorFingerprint",
            "prevHash",
            "timestamp",
            "signature",
            "deviceId",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_digest_ignores_signature() {
        let a = make_block();
        let mut b = a.clone();
        b.signature = "dd".repeat(64);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_first_mismatch() {
        let a = make_block();
        let mut b = a.clone();
        assert!(a.first_mismatch(&b).is_none());

        b.signature = "00".to_string();
        assert!(a.first_mismatch(&b).is_none());

        b.timestamp = "2024-05-01T12:00:01.000Z".to_string();
        let (field, ours, theirs) = a.first_mismatch(&b).unwrap();
        assert_eq!(field, "timestamp");
        assert_eq!(ours, a.timestamp);
        assert_eq!(theirs, b.timestamp);
    }

    #[test]
    fn test_expected_prev_hash() {
        assert_eq!(expected_prev_hash(None), "0");
        let b = make_block();
        assert_eq!(expected_prev_hash(Some(&b)), b.digest());
    }

    #[test]
    fn test_next_index() {
        let mut block = make_block();
        assert_eq!(next_index(None), Some(0));
        assert_eq!(next_index(Some(&block)), Some(2));
        block.index = u64::MAX;
        assert_eq!(next_index(Some(&block)), None);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = VerificationReport {
            frame_hash_match: true,
            frame_hash_details: String::new(),
            chain_continuity: true,
            chain_continuity_details: String::new(),
            signature_validity: true,
            signature_validity_details: String::new(),
            sensor_fingerprint_validity: true,
            sensor_fingerprint_details: String::new(),
            overall_valid: true,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"frameHashMatch\":true"));
        assert!(json.contains("\"overallValid\":true"));
    }
}
