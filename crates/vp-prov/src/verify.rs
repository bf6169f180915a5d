//! Verification of content against a claimed chain fragment.
//!
//! A claim is an untrusted, possibly partial and possibly unordered set of
//! blocks shipped alongside some content. Four independent checks are run
//! against one snapshot of the canonical chain, and every check is always
//! reported:
//!
//! - frame hash: the content fingerprint equals the canonical `chunkHash` of
//!   some block the claim references (first match in claim order),
//! - continuity: each claimed block exists on the canonical chain, equals it
//!   field-for-field (signature aside), the claimed indices are contiguous,
//!   and each `prevHash` links to the canonical predecessor,
//! - signatures: every claimed block is signed by its registered device,
//! - sensor fingerprints: every claimed block carries one. This is a
//!   presence check only; nothing cross-references a sensor registry.

use crate::signature::verify_block_signature;
use crate::store::{ChainStore, StoreError};
use crate::types::{Block, VerificationReport};
use std::collections::HashMap;
use tracing::{debug, info};
use vp_hash::{content_fingerprint, GENESIS_PREV_HASH};

/// Number of hex characters shown when a digest appears in a detail string.
const PREVIEW_LEN: usize = 16;

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub valid: bool,
    pub details: String,
}

impl Verdict {
    fn pass(details: impl Into<String>) -> Self {
        Self {
            valid: true,
            details: details.into(),
        }
    }

    fn fail(details: impl Into<String>) -> Self {
        Self {
            valid: false,
            details: details.into(),
        }
    }
}

/// Verify `content` and its `claim` against the store's canonical chain.
///
/// The chain is read once, up front; concurrent appends during the checks
/// are not observed. Only a store failure is an error; every verification
/// failure is reported inside the [`VerificationReport`].
pub fn verify_content<S: ChainStore + ?Sized>(
    store: &S,
    content: &[u8],
    claim: &[Block],
) -> Result<VerificationReport, StoreError> {
    let chain = store.chain()?;

    let mut public_keys = HashMap::new();
    for block in claim {
        if public_keys.contains_key(&block.device_id) {
            continue;
        }
        if let Some(device) = store.device(&block.device_id)? {
            public_keys.insert(device.device_id, device.public_key);
        }
    }

    let report = verify_against(&chain, &public_keys, content, claim);
    info!(
        claimed = claim.len(),
        chain_len = chain.len(),
        frame_hash = report.frame_hash_match,
        continuity = report.chain_continuity,
        signatures = report.signature_validity,
        overall = report.overall_valid,
        "content verified"
    );
    Ok(report)
}

/// Pure verification against an explicit chain snapshot.
///
/// `public_keys` maps device ids to hex-encoded public keys; a device
/// missing from the map is treated as unregistered.
pub fn verify_against(
    chain: &[Block],
    public_keys: &HashMap<String, String>,
    content: &[u8],
    claim: &[Block],
) -> VerificationReport {
    let frame = check_frame_hash(chain, content, claim);
    let continuity = check_continuity(chain, claim);
    let signatures = check_signatures(public_keys, claim);
    let sensors = check_sensor_fingerprints(claim);

    let overall_valid = frame.valid && continuity.valid && signatures.valid && sensors.valid;
    VerificationReport {
        frame_hash_match: frame.valid,
        frame_hash_details: frame.details,
        chain_continuity: continuity.valid,
        chain_continuity_details: continuity.details,
        signature_validity: signatures.valid,
        signature_validity_details: signatures.details,
        sensor_fingerprint_validity: sensors.valid,
        sensor_fingerprint_details: sensors.details,
        overall_valid,
    }
}

/// Match the content fingerprint against the canonical blocks the claim
/// references, in claim order. Out-of-range indices are skipped.
pub fn check_frame_hash(chain: &[Block], content: &[u8], claim: &[Block]) -> Verdict {
    if claim.is_empty() {
        return Verdict::fail("Claim references no blocks");
    }
    if chain.is_empty() {
        return Verdict::fail("No stored blockchain to verify against");
    }

    let fingerprint = content_fingerprint(content);
    let matched = claim
        .iter()
        .filter_map(|b| canonical_at(chain, b.index))
        .find(|stored| stored.chunk_hash == fingerprint);

    if let Some(stored) = matched {
        return Verdict::pass(format!(
            "Content hash matches block #{}: {}...",
            stored.index,
            preview(&fingerprint)
        ));
    }

    let expected = claim
        .iter()
        .map(|b| match canonical_at(chain, b.index) {
            Some(stored) => preview(&stored.chunk_hash),
            None => "N/A".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    Verdict::fail(format!(
        "Content hash {}... doesn't match any referenced blocks. Expected: {}",
        preview(&fingerprint),
        expected
    ))
}

/// Check that the claim is a faithful, contiguous excerpt of the chain.
pub fn check_continuity(chain: &[Block], claim: &[Block]) -> Verdict {
    if claim.is_empty() {
        return Verdict::pass("No blocks to verify");
    }

    let mut sorted: Vec<&Block> = claim.iter().collect();
    sorted.sort_by_key(|b| b.index);

    let mut prev_index: Option<u64> = None;
    for block in sorted {
        let index = block.index;
        let Some(stored) = canonical_at(chain, index) else {
            return Verdict::fail(format!(
                "Block {index} not found in stored blockchain (length {})",
                chain.len()
            ));
        };

        if let Some(prev) = prev_index {
            if index == prev {
                return Verdict::fail(format!("Block {index} appears more than once in claim"));
            }
            if index != prev + 1 {
                return Verdict::fail(format!("Gap in claim between blocks {prev} and {index}"));
            }
        }

        if let Some((field, expected, got)) = stored.first_mismatch(block) {
            return Verdict::fail(format!(
                "Block {index} {field} mismatch: expected {}..., got {}...",
                preview(&expected),
                preview(&got)
            ));
        }

        if let Err(details) = check_link(chain, block) {
            return Verdict::fail(details);
        }

        debug!(index, "claimed block matches canonical chain");
        prev_index = Some(index);
    }

    Verdict::pass(format!("All {} blocks match stored blockchain", claim.len()))
}

/// Verify every claimed signature, stopping at the first failure.
pub fn check_signatures(public_keys: &HashMap<String, String>, claim: &[Block]) -> Verdict {
    if claim.is_empty() {
        return Verdict::pass("No blocks to verify");
    }

    for block in claim {
        let Some(public_key) = public_keys.get(&block.device_id) else {
            return Verdict::fail(format!(
                "Device {} not registered (block {})",
                block.device_id, block.index
            ));
        };
        if !verify_block_signature(block, public_key) {
            return Verdict::fail(format!("Invalid signature at block {}", block.index));
        }
    }

    Verdict::pass(format!("All {} signatures valid", claim.len()))
}

/// Presence check for sensor fingerprints.
pub fn check_sensor_fingerprints(claim: &[Block]) -> Verdict {
    if claim.is_empty() {
        return Verdict::pass("No blocks to verify");
    }
    match claim.iter().find(|b| b.sensor_fingerprint.is_empty()) {
        Some(block) => Verdict::fail(format!("Block {} has no sensor fingerprint", block.index)),
        None => Verdict::pass("Sensor fingerprints present in all blocks"),
    }
}

fn check_link(chain: &[Block], block: &Block) -> Result<(), String> {
    if block.index == 0 {
        if block.prev_hash != GENESIS_PREV_HASH {
            return Err(format!(
                "Block 0 must carry genesis prevHash \"{GENESIS_PREV_HASH}\", got {}...",
                preview(&block.prev_hash)
            ));
        }
        return Ok(());
    }

    let Some(predecessor) = canonical_at(chain, block.index - 1) else {
        return Err(format!("Block {} has no canonical predecessor", block.index));
    };
    let expected = predecessor.digest();
    if block.prev_hash != expected {
        return Err(format!(
            "Block {} prevHash does not link to block {}: expected {}..., got {}...",
            block.index,
            block.index - 1,
            preview(&expected),
            preview(&block.prev_hash)
        ));
    }
    Ok(())
}

fn canonical_at(chain: &[Block], index: u64) -> Option<&Block> {
    usize::try_from(index).ok().and_then(|i| chain.get(i))
}

fn preview(s: &str) -> String {
    s.chars().take(PREVIEW_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{keygen, sign_block};
    use crate::types::expected_prev_hash;

    struct Fixture {
        chain: Vec<Block>,
        keys: HashMap<String, String>,
        contents: Vec<Vec<u8>>,
    }

    /// Build a valid canonical chain of `n` blocks signed by one device.
    fn build_chain(n: u64) -> Fixture {
        let (secret, public) = keygen();
        let mut chain: Vec<Block> = Vec::new();
        let mut contents = Vec::new();
        for i in 0..n {
            let content = format!("chunk {i}").into_bytes();
            let mut block = Block {
                index: i,
                chunk_hash: content_fingerprint(&content),
                sensor_fingerprint: format!("sensor-{i}"),
                prev_hash: expected_prev_hash(chain.last()),
                timestamp: format!("2024-05-01T12:00:{i:02}.000Z"),
                signature: String::new(),
                device_id: "cam-1".to_string(),
            };
            block.signature = sign_block(&block, &secret);
            chain.push(block);
            contents.push(content);
        }
        let mut keys = HashMap::new();
        keys.insert("cam-1".to_string(), hex::encode(public));
        Fixture {
            chain,
            keys,
            contents,
        }
    }

    #[test]
    fn test_verbatim_chain_is_valid() {
        let fx = build_chain(4);
        let report = verify_against(&fx.chain, &fx.keys, &fx.contents[2], &fx.chain);

        assert!(report.overall_valid, "{report:?}");
        assert!(report.frame_hash_details.contains("block #2"));
        assert_eq!(
            report.chain_continuity_details,
            "All 4 blocks match stored blockchain"
        );
        assert_eq!(report.signature_validity_details, "All 4 signatures valid");
    }

    #[test]
    fn test_partial_unordered_claim_is_valid() {
        let fx = build_chain(5);
        let claim = vec![fx.chain[3].clone(), fx.chain[1].clone(), fx.chain[2].clone()];
        let report = verify_against(&fx.chain, &fx.keys, &fx.contents[3], &claim);
        assert!(report.overall_valid, "{report:?}");
    }

    #[test]
    fn test_frame_hash_first_match_in_claim_order() {
        let fx = build_chain(3);
        let claim = vec![fx.chain[2].clone(), fx.chain[1].clone()];
        let verdict = check_frame_hash(&fx.chain, &fx.contents[1], &claim);
        assert!(verdict.valid);
        assert!(verdict.details.contains("block #1"));
    }

    #[test]
    fn test_frame_hash_mismatch_lists_expected() {
        let fx = build_chain(2);
        let mut out_of_range = fx.chain[1].clone();
        out_of_range.index = 9;
        let claim = vec![fx.chain[0].clone(), out_of_range];

        let verdict = check_frame_hash(&fx.chain, b"other content", &claim);
        assert!(!verdict.valid);
        assert!(verdict.details.contains(&fx.chain[0].chunk_hash[..PREVIEW_LEN]));
        assert!(verdict.details.contains("N/A"));
    }

    #[test]
    fn test_frame_hash_against_empty_chain() {
        let fx = build_chain(1);
        let verdict = check_frame_hash(&[], &fx.contents[0], &fx.chain);
        assert!(!verdict.valid);
        assert_eq!(verdict.details, "No stored blockchain to verify against");
    }

    #[test]
    fn test_wrong_content_leaves_other_checks_alone() {
        let fx = build_chain(3);
        let report = verify_against(&fx.chain, &fx.keys, b"tampered", &fx.chain);
        assert!(!report.frame_hash_match);
        assert!(report.chain_continuity);
        assert!(report.signature_validity);
        assert!(!report.overall_valid);
    }

    #[test]
    fn test_continuity_missing_block() {
        let fx = build_chain(2);
        let mut claim = fx.chain.clone();
        let mut extra = fx.chain[1].clone();
        extra.index = 2;
        claim.push(extra);

        let verdict = check_continuity(&fx.chain, &claim);
        assert!(!verdict.valid);
        assert!(verdict.details.starts_with("Block 2 not found"));
    }

    #[test]
    fn test_continuity_gap() {
        let fx = build_chain(4);
        let claim = vec![fx.chain[0].clone(), fx.chain[2].clone()];
        let verdict = check_continuity(&fx.chain, &claim);
        assert!(!verdict.valid);
        assert_eq!(verdict.details, "Gap in claim between blocks 0 and 2");
    }

    #[test]
    fn test_continuity_duplicate() {
        let fx = build_chain(2);
        let claim = vec![fx.chain[1].clone(), fx.chain[1].clone()];
        let verdict = check_continuity(&fx.chain, &claim);
        assert!(!verdict.valid);
        assert!(verdict.details.contains("more than once"));
    }

    #[test]
    fn test_continuity_field_mismatch_names_block_and_field() {
        let fx = build_chain(3);
        let mut claim = fx.chain.clone();
        claim[2].sensor_fingerprint = "spoofed".to_string();

        let verdict = check_continuity(&fx.chain, &claim);
        assert!(!verdict.valid);
        assert!(verdict.details.starts_with("Block 2 sensorFingerprint mismatch"));
    }

    #[test]
    fn test_continuity_ignores_signature_field() {
        let fx = build_chain(2);
        let mut claim = fx.chain.clone();
        claim[0].signature = "00".repeat(64);
        assert!(check_continuity(&fx.chain, &claim).valid);
        assert!(!check_signatures(&fx.keys, &claim).valid);
    }

    #[test]
    fn test_continuity_detects_broken_canonical_link() {
        let mut fx = build_chain(2);
        fx.chain[1].prev_hash = "ff".repeat(32);
        let verdict = check_continuity(&fx.chain, &fx.chain);
        assert!(!verdict.valid);
        assert!(verdict.details.starts_with("Block 1 prevHash does not link to block 0"));
    }

    #[test]
    fn test_continuity_detects_bad_genesis() {
        let mut fx = build_chain(1);
        fx.chain[0].prev_hash = "1".to_string();
        let verdict = check_continuity(&fx.chain, &fx.chain);
        assert!(!verdict.valid);
        assert!(verdict.details.starts_with("Block 0 must carry genesis prevHash"));
    }

    #[test]
    fn test_empty_claim() {
        let fx = build_chain(2);
        let report = verify_against(&fx.chain, &fx.keys, &fx.contents[0], &[]);
        assert!(report.chain_continuity);
        assert_eq!(report.chain_continuity_details, "No blocks to verify");
        assert!(report.signature_validity);
        assert!(!report.frame_hash_match);
        assert!(!report.overall_valid);
    }

    #[test]
    fn test_signatures_unregistered_device() {
        let fx = build_chain(2);
        let verdict = check_signatures(&HashMap::new(), &fx.chain);
        assert!(!verdict.valid);
        assert_eq!(verdict.details, "Device cam-1 not registered (block 0)");
    }

    #[test]
    fn test_signatures_stop_at_first_invalid() {
        let fx = build_chain(3);
        let mut claim = fx.chain.clone();
        claim[1].signature = "zz".to_string();
        claim[2].signature = "00".repeat(64);
        let verdict = check_signatures(&fx.keys, &claim);
        assert_eq!(verdict.details, "Invalid signature at block 1");
    }

    #[test]
    fn test_sensor_fingerprint_presence() {
        let fx = build_chain(2);
        assert!(check_sensor_fingerprints(&fx.chain).valid);

        let mut claim = fx.chain.clone();
        claim[1].sensor_fingerprint = "  ".to_string();
        assert!(check_sensor_fingerprints(&claim).valid);

        claim[1].sensor_fingerprint = String::new();
        let verdict = check_sensor_fingerprints(&claim);
        assert!(!verdict.valid);
        assert_eq!(verdict.details, "Block 1 has no sensor fingerprint");
    }
}
