//! Nether Boot - run a compiled WASM game module
//!
//! # Usage
//!
//! ```bash
//! nether-boot
//! nether-boot --config boot.toml
//! nether-boot --public-path https://cdn.example.com/game/ --entry-export greet
//! ```
//!
//! Without `--config`, `boot.toml` is read from the platform config directory
//! (defaults are used if it is missing or invalid).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use nether_boot::{AnySource, Boot, BootConfig, BootError, BootOutcome};

#[derive(Parser)]
#[command(name = "nether-boot")]
#[command(author, version, about = "Bootstrap loader for compiled WASM game modules")]
struct Args {
    /// Config file (default: boot.toml in the platform config directory)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the artifact prefix (directory or http(s) URL)
    #[arg(long)]
    public_path: Option<String>,

    /// Override the export called once the entry module is ready
    #[arg(long)]
    entry_export: Option<String>,
}

fn load_config(args: &Args) -> Result<BootConfig, BootError> {
    let mut config = match &args.config {
        Some(path) => BootConfig::load(path)?,
        None => BootConfig::load_default(),
    };
    if let Some(public_path) = &args.public_path {
        config.public_path = public_path.clone();
    }
    if let Some(entry_export) = &args.entry_export {
        config.entry_export = Some(entry_export.clone());
    }
    Ok(config)
}

fn run(config: BootConfig) -> Result<BootOutcome> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")?;

    let source = AnySource::for_public_path(&config.public_path);
    let boot = Boot::new(config, source)?;

    let local = tokio::task::LocalSet::new();
    let outcome = rt.block_on(local.run_until(boot.run()))?;
    Ok(outcome)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config) {
        Ok(BootOutcome::Ready) => {
            tracing::info!("Boot complete");
            ExitCode::SUCCESS
        }
        // Load and entry failures are already logged; the host stays up
        Ok(BootOutcome::Degraded(_)) | Ok(BootOutcome::EntryFailed(_)) => {
            tracing::warn!("Boot finished in a degraded state");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
