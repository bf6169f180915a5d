use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vp_cli::commands::device::CaptureOptions;
use vp_cli::commands::verify::VerifyOptions;
use vp_cli::commands::{chain, device, open_store, verify};
use vp_cli::config::Config;

/// Chunk provenance chain: register devices, append signed blocks, verify content.
#[derive(Parser, Debug)]
#[command(name = "vp", author = "vidprov contributors", version)]
struct Cli {
    /// Path to a TOML config file (default: ./vidprov.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory; overrides `data_dir` from the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new Ed25519 device keypair
    Keygen {
        /// Optional output path for the keypair (default: prints to stdout)
        output: Option<PathBuf>,
    },
    /// Register a device public key
    Register {
        /// Unique device identifier
        device_id: String,
        /// Hex-encoded Ed25519 public key
        public_key: String,
    },
    /// Build and sign the next block for a content chunk (prints JSON)
    Capture {
        /// Path to the chunk content
        content: PathBuf,
        /// Keypair file written by `vp keygen`
        #[arg(long)]
        key: PathBuf,
        /// Device the key belongs to
        #[arg(long)]
        device_id: String,
        /// Sensor fingerprint to record
        #[arg(long)]
        sensor: String,
        /// ISO-8601 capture time (default: now)
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Validate a block and append it to the canonical chain
    Append {
        /// Path to the block JSON
        block: PathBuf,
    },
    /// Verify content against a claimed chain fragment
    Verify {
        /// Path to the content file
        #[arg(long)]
        content: PathBuf,
        /// Path to the claimed blocks (JSON array)
        #[arg(long)]
        claim: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Display the canonical chain
    Log,
    /// Re-check every invariant of the canonical chain
    Audit,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.log_filter);

    let data_dir = cli.data_dir.unwrap_or(config.data_dir);
    debug!(data_dir = %data_dir.display(), "resolved data directory");

    match cli.command {
        Commands::Keygen { output } => device::cmd_keygen(output),
        Commands::Register {
            device_id,
            public_key,
        } => device::cmd_register(&open_store(&data_dir)?, &device_id, &public_key),
        Commands::Capture {
            content,
            key,
            device_id,
            sensor,
            timestamp,
        } => device::cmd_capture(
            &open_store(&data_dir)?,
            CaptureOptions {
                content,
                key,
                device_id,
                sensor,
                timestamp,
            },
        ),
        Commands::Append { block } => chain::cmd_append(&open_store(&data_dir)?, &block),
        Commands::Verify {
            content,
            claim,
            json,
        } => verify::cmd_verify(
            &open_store(&data_dir)?,
            VerifyOptions {
                content,
                claim,
                json,
            },
        ),
        Commands::Log => chain::cmd_log(&open_store(&data_dir)?),
        Commands::Audit => chain::cmd_audit(&open_store(&data_dir)?),
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
