//! Device-side commands: key generation, registration, and block capture.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vp_prov::{
    content_fingerprint, expected_prev_hash, keygen, next_index, register_device, sign_block,
    Block, ChainStore,
};

/// On-disk keypair written by `vp keygen`.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyFile {
    pub private_key: String,
    pub public_key: String,
}

impl KeyFile {
    /// Read a keypair file and decode its 32-byte secret.
    pub fn load_secret(path: &Path) -> Result<[u8; 32]> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read key file {}", path.display()))?;
        let key_file: KeyFile = serde_json::from_str(&json).context("failed to parse key file")?;
        let bytes = hex::decode(&key_file.private_key).context("private key is not hex")?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| anyhow::anyhow!("private key must be 32 bytes"))
    }
}

/// Inputs for `vp capture`.
pub struct CaptureOptions {
    pub content: PathBuf,
    pub key: PathBuf,
    pub device_id: String,
    pub sensor: String,
    pub timestamp: Option<String>,
}

/// Handle the vp keygen command.
pub fn cmd_keygen(output: Option<PathBuf>) -> Result<()> {
    let (private_key, public_key) = keygen();
    let key_file = KeyFile {
        private_key: hex::encode(private_key),
        public_key: hex::encode(public_key),
    };

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&key_file)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write keypair to {}", path.display()))?;
        println!("{} Keypair written to {}", "✓".green(), path.display());
        println!("{}: {}", "Public Key".bold().green(), key_file.public_key);
    } else {
        println!("{}", "Generated Ed25519 Keypair".bold().underline());
        println!("{}: {}", "Private Key".bold().red(), key_file.private_key);
        println!("{}: {}", "Public Key".bold().green(), key_file.public_key);
        println!();
        println!(
            "{}",
            "WARNING: Keep the private key on the device!".yellow().bold()
        );
    }

    Ok(())
}

/// Handle the vp register command.
pub fn cmd_register<S: ChainStore>(store: &S, device_id: &str, public_key: &str) -> Result<()> {
    let device = register_device(store, device_id, public_key)
        .with_context(|| format!("failed to register device {device_id}"))?;
    println!(
        "{} Device {} registered at {}",
        "✓".green().bold(),
        device.device_id.bold(),
        device.registered_at
    );
    Ok(())
}

/// Handle the vp capture command.
///
/// Builds the block that would extend the current chain tail with the given
/// content, signs it with the device key, and prints it as JSON on stdout.
pub fn cmd_capture<S: ChainStore>(store: &S, opts: CaptureOptions) -> Result<()> {
    let secret = KeyFile::load_secret(&opts.key)?;
    let content = fs::read(&opts.content)
        .with_context(|| format!("failed to read content {}", opts.content.display()))?;
    let last = store.last_block().context("failed to read chain tail")?;
    let index = next_index(last.as_ref()).context("chain tail index cannot be extended")?;

    let mut block = Block {
        index,
        chunk_hash: content_fingerprint(&content),
        sensor_fingerprint: opts.sensor,
        prev_hash: expected_prev_hash(last.as_ref()),
        timestamp: opts
            .timestamp
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        signature: String::new(),
        device_id: opts.device_id,
    };
    block.signature = sign_block(&block, &secret);

    println!("{}", serde_json::to_string_pretty(&block)?);
    Ok(())
}
