//! Admission of new blocks onto the canonical chain.
//!
//! A candidate must pass, in order: device lookup, index check, linkage
//! check, and signature check. Only then is it committed, through the
//! store's compare-and-append, so two racing appends cannot both claim the
//! same index.

use crate::parse::{parse_block, ValidationError};
use crate::signature::verify_block_signature;
use crate::store::{ChainStore, StoreError};
use crate::types::{expected_prev_hash, next_index, Block};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons an append attempt is rejected.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("invalid block: {0}")]
    Validation(#[from] ValidationError),

    #[error("Device {0} not registered")]
    DeviceNotRegistered(String),

    #[error("Invalid block index. Expected {expected}, got {got}")]
    IndexMismatch { expected: u64, got: u64 },

    #[error("Previous hash does not match. Expected {expected}, got {got}")]
    PrevHashMismatch { expected: String, got: String },

    #[error("Invalid signature on block {index}")]
    InvalidSignature { index: u64 },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

impl AppendError {
    /// Short machine-friendly name of the rejection kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppendError::Validation(_) => "validation",
            AppendError::DeviceNotRegistered(_) => "device_not_registered",
            AppendError::IndexMismatch { .. } => "index_mismatch",
            AppendError::PrevHashMismatch { .. } => "prev_hash_mismatch",
            AppendError::InvalidSignature { .. } => "invalid_signature",
            AppendError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

/// Validate `candidate` against the current tail and append it.
///
/// Returns the appended block. On any error the chain is left untouched.
pub fn try_append<S: ChainStore + ?Sized>(
    store: &S,
    candidate: Block,
) -> Result<Block, AppendError> {
    let result = validate_and_commit(store, candidate);
    match &result {
        Ok(block) => info!(index = block.index, device_id = %block.device_id, "block appended"),
        Err(e) => warn!(reason = e.kind(), error = %e, "append rejected"),
    }
    result
}

/// Parse raw JSON into a block, then [`try_append`] it.
pub fn try_append_json<S: ChainStore + ?Sized>(
    store: &S,
    bytes: &[u8],
) -> Result<Block, AppendError> {
    let candidate = match parse_block(bytes) {
        Ok(block) => block,
        Err(e) => {
            warn!(reason = "validation", error = %e, "append rejected");
            return Err(e.into());
        }
    };
    try_append(store, candidate)
}

fn validate_and_commit<S: ChainStore + ?Sized>(
    store: &S,
    candidate: Block,
) -> Result<Block, AppendError> {
    let device = store
        .device(&candidate.device_id)
        .map_err(AppendError::StorageUnavailable)?
        .ok_or_else(|| AppendError::DeviceNotRegistered(candidate.device_id.clone()))?;
    debug!(device_id = %device.device_id, "device found");

    let last = store.last_block().map_err(AppendError::StorageUnavailable)?;
    // Nothing can follow a tail at u64::MAX.
    let expected_index = next_index(last.as_ref()).ok_or(AppendError::IndexMismatch {
        expected: u64::MAX,
        got: candidate.index,
    })?;
    if candidate.index != expected_index {
        return Err(AppendError::IndexMismatch {
            expected: expected_index,
            got: candidate.index,
        });
    }
    debug!(index = candidate.index, "index ok");

    let expected_prev = expected_prev_hash(last.as_ref());
    if candidate.prev_hash != expected_prev {
        return Err(AppendError::PrevHashMismatch {
            expected: expected_prev,
            got: candidate.prev_hash,
        });
    }
    debug!(index = candidate.index, "linkage ok");

    if !verify_block_signature(&candidate, &device.public_key) {
        return Err(AppendError::InvalidSignature {
            index: candidate.index,
        });
    }
    debug!(index = candidate.index, "signature ok");

    let got = candidate.index;
    store
        .append_block(candidate, expected_index)
        .map_err(|e| match e {
            StoreError::Conflict { actual, .. } => AppendError::IndexMismatch {
                expected: actual,
                got,
            },
            other => AppendError::StorageUnavailable(other),
        })
}
