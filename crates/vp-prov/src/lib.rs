//! Hash-chain integrity and provenance verification for signed content chunks.
//!
//! Each captured chunk becomes a [`Block`] that links to its predecessor by
//! canonical digest and is signed by the capturing device's Ed25519 key. This
//! crate answers two questions:
//!
//! - may a candidate block be appended to the canonical chain ([`try_append`]),
//! - does a claimed chain fragment shipped with some content faithfully match
//!   the canonical chain ([`verify_content`]).
//!
//! Storage is abstracted behind [`ChainStore`]; [`MemoryStore`] and
//! [`JsonStore`] are provided.
//!
//! # Example
//!
//! ```
//! use vp_prov::{
//!     content_fingerprint, expected_prev_hash, keygen, register_device, sign_block, try_append,
//!     verify_content, Block, ChainStore, MemoryStore,
//! };
//!
//! let store = MemoryStore::new();
//! let (secret, public) = keygen();
//! register_device(&store, "cam-1", &hex::encode(public)).unwrap();
//!
//! let content = b"first chunk";
//! let mut block = Block {
//!     index: 0,
//!     chunk_hash: content_fingerprint(content),
//!     sensor_fingerprint: "imx-586".to_string(),
//!     prev_hash: expected_prev_hash(None),
//!     timestamp: "2024-05-01T12:00:00.000Z".to_string(),
//!     signature: String::new(),
//!     device_id: "cam-1".to_string(),
//! };
//! block.signature = sign_block(&block, &secret);
//! try_append(&store, block).unwrap();
//!
//! let claim = store.chain().unwrap();
//! let report = verify_content(&store, content, &claim).unwrap();
//! assert!(report.overall_valid);
//! ```

mod append;
mod audit;
mod parse;
mod registry;
mod signature;
mod store;
mod types;
mod verify;

pub use append::{try_append, try_append_json, AppendError};
pub use audit::{audit_blocks, audit_chain, AuditReport, ChainFault};
pub use parse::{
    block_from_value, parse_block, parse_claim, validate_registration, ValidationError,
};
pub use registry::{register_device, RegisterError};
pub use signature::{
    keygen, sign_block, sign_message, verify_block_signature, verify_signature,
    verify_signature_hex, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};
pub use store::{ChainStore, JsonStore, MemoryStore, StoreError, CHAIN_FILE, DEVICES_FILE};
pub use types::{expected_prev_hash, next_index, Block, Device, VerificationReport};
pub use vp_hash::{canonical_digest, content_fingerprint, GENESIS_PREV_HASH};
pub use verify::{
    check_continuity, check_frame_hash, check_sensor_fingerprints, check_signatures,
    verify_against, verify_content, Verdict,
};
