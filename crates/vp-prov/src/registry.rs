//! Device registration.

use crate::parse::{validate_registration, ValidationError};
use crate::store::{ChainStore, StoreError};
use crate::types::Device;
use chrono::Utc;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while registering a device.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("invalid registration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Device {0} already registered")]
    AlreadyRegistered(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

/// Register a device under `device_id`, insert-if-absent.
pub fn register_device<S: ChainStore + ?Sized>(
    store: &S,
    device_id: &str,
    public_key_hex: &str,
) -> Result<Device, RegisterError> {
    validate_registration(device_id, public_key_hex)?;

    let device = Device {
        device_id: device_id.to_string(),
        public_key: public_key_hex.to_ascii_lowercase(),
        registered_at: Utc::now(),
    };
    let device = store.insert_device(device).map_err(|e| match e {
        StoreError::DeviceExists(id) => RegisterError::AlreadyRegistered(id),
        other => RegisterError::StorageUnavailable(other),
    })?;

    info!(device_id = %device.device_id, "device registered");
    Ok(device)
}
