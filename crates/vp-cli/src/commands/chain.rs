//! Chain commands: append, log, audit.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;
use vp_prov::{audit_chain, try_append_json, ChainStore};

/// Handle the vp append command.
pub fn cmd_append<S: ChainStore>(store: &S, block_file: &Path) -> Result<()> {
    let bytes = fs::read(block_file)
        .with_context(|| format!("failed to read block {}", block_file.display()))?;
    let block = try_append_json(store, &bytes).context("block rejected")?;
    println!(
        "{} Block {} appended ({})",
        "✓".green().bold(),
        block.index.to_string().bold(),
        block.digest()
    );
    Ok(())
}

/// Handle the vp log command.
pub fn cmd_log<S: ChainStore>(store: &S) -> Result<()> {
    let chain = store.chain().context("failed to read chain")?;

    if chain.is_empty() {
        println!("{}", "Chain is empty".yellow());
        return Ok(());
    }

    println!("{}", "Canonical Chain".bold().underline());
    println!("{}: {}", "Blocks".bold(), chain.len());
    println!();

    for block in &chain {
        println!("{} {}", "Block".bold().cyan(), block.index.to_string().cyan());
        println!("  {}: {}", "Digest".bold(), block.digest());
        println!("  {}: {}", "Previous".bold(), block.prev_hash);
        println!("  {}: {}", "Chunk Hash".bold(), block.chunk_hash);
        println!("  {}: {}", "Sensor".bold(), block.sensor_fingerprint);
        println!("  {}: {}", "Timestamp".bold(), block.timestamp);
        println!("  {}: {}", "Device".bold(), block.device_id.green());
        println!(
            "  {}: {}",
            "Signature".bold(),
            signature_preview(&block.signature)
        );
        println!();
    }

    Ok(())
}

/// First 20 characters of a signature, with an ellipsis if cut.
fn signature_preview(signature: &str) -> String {
    if signature.chars().count() > 20 {
        format!("{}...", signature.chars().take(20).collect::<String>())
    } else {
        signature.to_string()
    }
}

/// Handle the vp audit command.
pub fn cmd_audit<S: ChainStore>(store: &S) -> Result<()> {
    let report = audit_chain(store).context("failed to read chain")?;

    for fault in &report.faults {
        println!("{} {}", "✗".red().bold(), fault);
    }

    println!();
    println!("{}", "Summary:".bold().underline());
    println!("  {}: {}", "Blocks".bold(), report.length);
    if report.is_valid() {
        println!("  {}: {}", "Status".bold(), "VALID".green().bold());
        Ok(())
    } else {
        println!("  {}: {}", "Status".bold(), "INVALID".red().bold());
        anyhow::bail!("chain audit found {} fault(s)", report.faults.len())
    }
}
