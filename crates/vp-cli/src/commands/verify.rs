//! Content verification command.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use vp_prov::{parse_claim, verify_content, ChainStore, VerificationReport};

/// Inputs for `vp verify`.
pub struct VerifyOptions {
    pub content: PathBuf,
    pub claim: PathBuf,
    pub json: bool,
}

/// Handle the vp verify command.
///
/// Fails (non-zero exit) when the content is not proven authentic.
pub fn cmd_verify<S: ChainStore>(store: &S, opts: VerifyOptions) -> Result<()> {
    let content = fs::read(&opts.content)
        .with_context(|| format!("failed to read content {}", opts.content.display()))?;
    let claim_bytes = fs::read(&opts.claim)
        .with_context(|| format!("failed to read claim {}", opts.claim.display()))?;
    let claim = parse_claim(&claim_bytes).context("invalid claim")?;

    let report = verify_content(store, &content, &claim).context("failed to read chain")?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.overall_valid {
        anyhow::bail!("content failed verification");
    }
    Ok(())
}

fn print_report(report: &VerificationReport) {
    let rows = [
        ("Frame Hash", report.frame_hash_match, &report.frame_hash_details),
        (
            "Chain Continuity",
            report.chain_continuity,
            &report.chain_continuity_details,
        ),
        (
            "Signatures",
            report.signature_validity,
            &report.signature_validity_details,
        ),
        (
            "Sensor Fingerprints",
            report.sensor_fingerprint_validity,
            &report.sensor_fingerprint_details,
        ),
    ];

    println!("{}", "Verification Report".bold().underline());
    for (label, valid, details) in rows {
        let mark = if valid {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        };
        println!("{} {}: {}", mark, label.bold(), details);
    }

    println!();
    let status = if report.overall_valid {
        "AUTHENTIC".green().bold()
    } else {
        "NOT VERIFIED".red().bold()
    };
    println!("  {}: {}", "Status".bold(), status);
}
