//! Nether Boot - bootstrap for compiled WASM game modules
//!
//! Fetches a game's compiled module, instantiates it against a host
//! companion module, and hands control to the game's entry export.
//!
//! # Architecture
//!
//! - [`Loader`] - Coalescing async module loader owning the [`ModuleRegistry`]
//! - [`ArtifactSource`] - Byte retrieval for module artifacts (disk or HTTP)
//! - [`companion`] - Host companion module the game's imports forward to
//! - [`Boot`] - Entry sequencer: one load, then the entry export

pub mod abi;
pub mod companion;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod registry;
pub mod sequencer;
#[cfg(test)]
pub mod test_utils;
pub mod wasm;

pub use config::{BootConfig, ModuleDescriptor};
pub use error::{BootError, ContractViolation, FetchError, GuestFault, GuestThrow, LoadError};
pub use fetch::{AnySource, ArtifactSource, FileSource, HttpSource, artifact_path};
pub use loader::Loader;
pub use registry::{LoadState, ModuleId, ModuleRegistry};
pub use sequencer::{Boot, BootOutcome};
pub use wasm::{BootState, HostExport, HostModule, ModuleExports, Signature, WasmEngine};
