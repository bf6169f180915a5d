//! Persistence port for devices and the canonical chain, plus adapters.
//!
//! The engine only talks to [`ChainStore`]. Two adapters are provided:
//! [`MemoryStore`] for tests and embedding, [`JsonStore`] for a data
//! directory holding `devices.json` and `blockchain.json`.

use crate::types::{Block, Device};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the device registry inside a data directory.
pub const DEVICES_FILE: &str = "devices.json";

/// File name of the canonical chain inside a data directory.
pub const CHAIN_FILE: &str = "blockchain.json";

/// Errors raised by a persistence adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("chain length changed: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("device {0} already registered")]
    DeviceExists(String),
}

/// Storage operations the engine depends on.
///
/// Implementations must make [`ChainStore::append_block`] atomic with
/// respect to concurrent callers and must hand out [`ChainStore::chain`]
/// as a consistent snapshot.
pub trait ChainStore: Send + Sync {
    /// Look up a registered device.
    fn device(&self, device_id: &str) -> Result<Option<Device>, StoreError>;

    /// Insert a device unless one with the same id already exists.
    fn insert_device(&self, device: Device) -> Result<Device, StoreError>;

    /// The current chain tail.
    fn last_block(&self) -> Result<Option<Block>, StoreError>;

    /// Owned snapshot of the whole chain, oldest first.
    fn chain(&self) -> Result<Vec<Block>, StoreError>;

    /// Number of blocks on the chain.
    fn len(&self) -> Result<u64, StoreError>;

    /// Check if the chain is empty.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Append `block` iff the chain currently holds exactly `expected_len`
    /// blocks. Fails with [`StoreError::Conflict`] otherwise.
    fn append_block(&self, block: Block, expected_len: u64) -> Result<Block, StoreError>;
}

#[derive(Debug, Default)]
struct State {
    devices: BTreeMap<String, Device>,
    blocks: Vec<Block>,
}

impl State {
    fn len(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn check_len(&self, expected_len: u64) -> Result<(), StoreError> {
        let actual = self.len();
        if actual != expected_len {
            warn!(expected = expected_len, actual, "compare-and-append conflict");
            return Err(StoreError::Conflict {
                expected: expected_len,
                actual,
            });
        }
        Ok(())
    }
}

fn read(lock: &RwLock<State>) -> Result<RwLockReadGuard<'_, State>, StoreError> {
    lock.read().map_err(|_| StoreError::Poisoned)
}

fn write(lock: &RwLock<State>) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
    lock.write().map_err(|_| StoreError::Poisoned)
}

/// In-memory store guarded by a single `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing devices and blocks, taken as-is.
    pub fn with_contents(devices: Vec<Device>, blocks: Vec<Block>) -> Self {
        let devices = devices
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
        Self {
            state: RwLock::new(State { devices, blocks }),
        }
    }
}

impl ChainStore for MemoryStore {
    fn device(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        Ok(read(&self.state)?.devices.get(device_id).cloned())
    }

    fn insert_device(&self, device: Device) -> Result<Device, StoreError> {
        let mut state = write(&self.state)?;
        if state.devices.contains_key(&device.device_id) {
            return Err(StoreError::DeviceExists(device.device_id));
        }
        state.devices.insert(device.device_id.clone(), device.clone());
        Ok(device)
    }

    fn last_block(&self) -> Result<Option<Block>, StoreError> {
        Ok(read(&self.state)?.blocks.last().cloned())
    }

    fn chain(&self) -> Result<Vec<Block>, StoreError> {
        Ok(read(&self.state)?.blocks.clone())
    }

    fn len(&self) -> Result<u64, StoreError> {
        Ok(read(&self.state)?.len())
    }

    fn append_block(&self, block: Block, expected_len: u64) -> Result<Block, StoreError> {
        let mut state = write(&self.state)?;
        state.check_len(expected_len)?;
        state.blocks.push(block.clone());
        Ok(block)
    }
}

/// Store backed by two pretty-printed JSON arrays in a data directory.
///
/// Files are loaded once on [`JsonStore::open`] and rewritten on every
/// mutation while the write lock is held. A failed write leaves both the
/// files and the in-memory state unchanged.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    state: RwLock<State>,
}

impl JsonStore {
    /// Open (creating if needed) the data directory at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let devices: Vec<Device> = load_array(&dir.join(DEVICES_FILE))?;
        let blocks: Vec<Block> = load_array(&dir.join(CHAIN_FILE))?;
        debug!(
            dir = %dir.display(),
            devices = devices.len(),
            blocks = blocks.len(),
            "opened json store"
        );

        let devices = devices
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
        Ok(Self {
            dir,
            state: RwLock::new(State { devices, blocks }),
        })
    }

    /// The data directory this store persists into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChainStore for JsonStore {
    fn device(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        Ok(read(&self.state)?.devices.get(device_id).cloned())
    }

    fn insert_device(&self, device: Device) -> Result<Device, StoreError> {
        let mut state = write(&self.state)?;
        if state.devices.contains_key(&device.device_id) {
            return Err(StoreError::DeviceExists(device.device_id));
        }
        let mut all: Vec<&Device> = state.devices.values().collect();
        all.push(&device);
        save_array(&self.dir.join(DEVICES_FILE), &all)?;
        state.devices.insert(device.device_id.clone(), device.clone());
        Ok(device)
    }

    fn last_block(&self) -> Result<Option<Block>, StoreError> {
        Ok(read(&self.state)?.blocks.last().cloned())
    }

    fn chain(&self) -> Result<Vec<Block>, StoreError> {
        Ok(read(&self.state)?.blocks.clone())
    }

    fn len(&self) -> Result<u64, StoreError> {
        Ok(read(&self.state)?.len())
    }

    fn append_block(&self, block: Block, expected_len: u64) -> Result<Block, StoreError> {
        let mut state = write(&self.state)?;
        state.check_len(expected_len)?;
        let mut all: Vec<&Block> = state.blocks.iter().collect();
        all.push(&block);
        save_array(&self.dir.join(CHAIN_FILE), &all)?;
        state.blocks.push(block.clone());
        Ok(block)
    }
}

fn load_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write through a temporary sibling so readers never see a torn file.
fn save_array<T: serde::Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(items)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
