//! Error types for artifact fetching, module loading and boot sequencing

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::ModuleId;
use crate::wasm::Signature;

/// Transport failure while retrieving artifact bytes
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

/// A build or deployment defect detected while linking or forwarding a host import.
///
/// These are never recoverable at runtime; the boot sequencer escalates them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    #[error("companion module '{companion}' was not loaded before '{name}' was called")]
    CompanionNotLoaded { companion: ModuleId, name: String },
    #[error("companion module '{companion}' does not export '{name}'")]
    MissingExport { companion: ModuleId, name: String },
    #[error("import '{companion}::{name}' is declared as {expected} but the companion provides {actual}")]
    SignatureMismatch {
        companion: ModuleId,
        name: String,
        expected: Signature,
        actual: Signature,
    },
    #[error("import '{namespace}::{name}' from a host module must be a function")]
    UnsupportedImport { namespace: String, name: String },
    #[error("'{name}' called with {params} params and {results} results, declared {declared}")]
    ArityMismatch {
        name: String,
        params: usize,
        results: usize,
        declared: Signature,
    },
}

/// A companion export rejected an argument supplied by the guest.
///
/// Traps out of the guest call like a thrown host exception; never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("bad argument to '{name}': {reason}")]
pub struct GuestFault {
    pub name: String,
    pub reason: String,
}

/// Raised by the guest through `__wbindgen_throw`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("guest threw: {message}")]
pub struct GuestThrow {
    pub message: String,
}

/// Why a module load failed.
///
/// Cloneable so a single failure can be delivered to every coalesced waiter.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("module '{0}' is not listed in the artifact manifest")]
    UnknownModule(ModuleId),
    #[error("failed to fetch module '{module}': {source}")]
    Fetch {
        module: ModuleId,
        #[source]
        source: Arc<FetchError>,
    },
    #[error("failed to compile module '{module}': {reason}")]
    Compile { module: ModuleId, reason: String },
    #[error("module '{module}' exceeds the memory limit: {reason}")]
    MemoryLimit { module: ModuleId, reason: String },
    #[error("module '{module}' imports from '{namespace}', which is neither loaded nor in the manifest")]
    UnresolvedImport { module: ModuleId, namespace: String },
    #[error("module '{module}' imports from '{namespace}', which is waiting on '{module}' to load")]
    CyclicImport { module: ModuleId, namespace: ModuleId },
    #[error("failed to instantiate module '{module}': {reason}")]
    Instantiate { module: ModuleId, reason: String },
    #[error("loading module '{module}' timed out after {after:?}")]
    Timeout { module: ModuleId, after: Duration },
    #[error("dependency of module '{module}' failed to load: {source}")]
    Dependency {
        module: ModuleId,
        #[source]
        source: Box<LoadError>,
    },
    #[error("module '{module}' violates the host contract: {source}")]
    Contract {
        module: ModuleId,
        #[source]
        source: ContractViolation,
    },
}

impl LoadError {
    /// The module this error is reported against
    pub fn module(&self) -> &ModuleId {
        match self {
            Self::UnknownModule(module)
            | Self::Fetch { module, .. }
            | Self::Compile { module, .. }
            | Self::MemoryLimit { module, .. }
            | Self::UnresolvedImport { module, .. }
            | Self::CyclicImport { module, .. }
            | Self::Instantiate { module, .. }
            | Self::Timeout { module, .. }
            | Self::Dependency { module, .. }
            | Self::Contract { module, .. } => module,
        }
    }

    /// The contract violation behind this error, following dependency failures
    pub fn contract_violation(&self) -> Option<&ContractViolation> {
        match self {
            Self::Contract { source, .. } => Some(source),
            Self::Dependency { source, .. } => source.contract_violation(),
            _ => None,
        }
    }

    /// Contract violations are deployment defects, not runtime conditions
    pub fn is_fatal(&self) -> bool {
        self.contract_violation().is_some()
    }
}

/// Errors that stop the boot sequence outright
#[derive(Error, Debug)]
pub enum BootError {
    #[error("fatal contract violation: {0}")]
    Fatal(ContractViolation),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to create WASM engine: {0}")]
    Engine(String),
}
