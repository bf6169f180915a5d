//! Subcommand implementations.

pub mod chain;
pub mod device;
pub mod verify;

use anyhow::{Context, Result};
use std::path::Path;
use vp_prov::JsonStore;

/// Open the JSON data directory used by every store-backed command.
pub fn open_store(data_dir: &Path) -> Result<JsonStore> {
    JsonStore::open(data_dir)
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))
}
