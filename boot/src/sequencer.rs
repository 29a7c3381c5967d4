//! Entry sequencer
//!
//! Registers the companion, loads the entry chunk and entry module exactly
//! once, then runs the entry export. Load and entry failures are logged and
//! reported as outcomes; only contract violations stop the boot.

use crate::companion::companion_module;
use crate::config::BootConfig;
use crate::error::{BootError, ContractViolation, LoadError};
use crate::fetch::ArtifactSource;
use crate::loader::Loader;

/// How far the boot sequence got
#[derive(Debug)]
pub enum BootOutcome {
    /// The entry module is loaded and the entry export (if any) returned
    Ready,
    /// The entry module could not be loaded
    Degraded(LoadError),
    /// The entry module loaded but its entry export was missing or trapped
    EntryFailed(String),
}

/// Boot sequence over one loader context
pub struct Boot<S> {
    loader: Loader<S>,
}

impl<S: ArtifactSource + 'static> Boot<S> {
    /// Create the loader and register the companion module
    pub fn new(config: BootConfig, source: S) -> Result<Self, BootError> {
        let companion = config.companion_id.clone();
        let loader =
            Loader::new(config, source).map_err(|e| BootError::Engine(format!("{:#}", e)))?;
        loader.register_host_module(companion, companion_module());
        Ok(Self { loader })
    }

    pub fn loader(&self) -> &Loader<S> {
        &self.loader
    }

    /// Run the boot sequence once. Must be driven inside a `LocalSet`.
    pub async fn run(&self) -> Result<BootOutcome, BootError> {
        let config = self.loader.config();

        if let Err(err) = self.load_entry().await {
            if let Some(violation) = err.contract_violation() {
                tracing::error!("Fatal contract violation while loading: {}", err);
                return Err(BootError::Fatal(violation.clone()));
            }
            tracing::error!("Error importing entry module: {}", err);
            return Ok(BootOutcome::Degraded(err));
        }

        let Some(export) = config.entry_export.as_deref() else {
            tracing::info!("Entry module '{}' ready", config.entry_module);
            return Ok(BootOutcome::Ready);
        };

        let Some(exports) = self.loader.exports(&config.entry_module) else {
            return Ok(entry_failed(format!(
                "entry module '{}' is not loaded",
                config.entry_module
            )));
        };
        let Some(wasm) = exports.as_wasm() else {
            return Ok(entry_failed(format!(
                "entry module '{}' is a host module",
                config.entry_module
            )));
        };
        if !wasm.has_export(export) {
            return Ok(entry_failed(format!(
                "entry module '{}' does not export '{}'",
                config.entry_module, export
            )));
        }

        tracing::info!("Calling entry export '{}'", export);
        match wasm.call(export, &[]) {
            Ok(_) => Ok(BootOutcome::Ready),
            Err(err) => {
                if let Some(violation) = err.downcast_ref::<ContractViolation>() {
                    tracing::error!("Fatal contract violation in '{}': {}", export, violation);
                    return Err(BootError::Fatal(violation.clone()));
                }
                Ok(entry_failed(format!("{:#}", err)))
            }
        }
    }

    async fn load_entry(&self) -> Result<(), LoadError> {
        let config = self.loader.config();
        if let Some(chunk) = &config.entry_chunk {
            self.loader.load_chunk(chunk).await?;
        }
        self.loader.load(config.entry_module.clone()).await?;
        Ok(())
    }
}

fn entry_failed(reason: String) -> BootOutcome {
    tracing::error!("Entry failed: {}", reason);
    BootOutcome::EntryFailed(reason)
}
