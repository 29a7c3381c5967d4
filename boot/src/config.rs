//! Boot configuration (boot.toml)
//!
//! Describes where artifacts live, which modules and chunks exist, and how the
//! entry sequencer starts the game. Stored in TOML in the platform config dir
//! unless a path is given explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::abi::{COMPANION_NAMESPACE, DEFAULT_COMPANION_ID, DEFAULT_ENTRY_MODULE};
use crate::registry::ModuleId;
use crate::wasm::DEFAULT_RAM_LIMIT;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "boot.toml";

/// Failure to read or parse an explicitly requested config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Artifact descriptor for one binary module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Content hash naming the artifact file
    pub hash: String,
}

/// Boot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootConfig {
    /// Prefix for artifact paths: a directory or an `http(s)://` URL (default: "")
    #[serde(default)]
    pub public_path: String,
    /// Upper bound on fetch + compile for one module (default: 120)
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
    /// Maximum guest linear memory in bytes (default: 16MB)
    #[serde(default = "default_ram_limit")]
    pub ram_limit: usize,
    /// Registry id the companion host module is installed under
    #[serde(default = "default_companion_id")]
    pub companion_id: ModuleId,
    /// Import namespace -> registry id; unmapped namespaces are ids themselves
    #[serde(default = "default_import_map")]
    pub import_map: HashMap<String, ModuleId>,
    /// Chunk loaded at boot; takes precedence over `entry_module`
    #[serde(default)]
    pub entry_chunk: Option<String>,
    /// Module whose exports the entry point runs against
    #[serde(default = "default_entry_module")]
    pub entry_module: ModuleId,
    /// Export called once the entry module is ready
    #[serde(default)]
    pub entry_export: Option<String>,
    /// Fixed seed for reproducible randomness; OS entropy when absent
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Artifact manifest: module id -> descriptor
    #[serde(default)]
    pub modules: HashMap<ModuleId, ModuleDescriptor>,
    /// Chunk id -> modules loaded together
    #[serde(default)]
    pub chunks: HashMap<String, Vec<ModuleId>>,
}

fn default_load_timeout_secs() -> u64 {
    120
}
fn default_ram_limit() -> usize {
    DEFAULT_RAM_LIMIT
}
fn default_companion_id() -> ModuleId {
    ModuleId::from(DEFAULT_COMPANION_ID)
}
fn default_import_map() -> HashMap<String, ModuleId> {
    [(COMPANION_NAMESPACE.to_string(), default_companion_id())]
        .into_iter()
        .collect()
}
fn default_entry_module() -> ModuleId {
    ModuleId::from(DEFAULT_ENTRY_MODULE)
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            public_path: String::new(),
            load_timeout_secs: default_load_timeout_secs(),
            ram_limit: default_ram_limit(),
            companion_id: default_companion_id(),
            import_map: default_import_map(),
            entry_chunk: None,
            entry_module: default_entry_module(),
            entry_export: None,
            random_seed: None,
            modules: HashMap::new(),
            chunks: HashMap::new(),
        }
    }
}

impl BootConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Registry id an import namespace refers to
    pub fn resolve_namespace(&self, namespace: &str) -> ModuleId {
        self.import_map
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| ModuleId::from(namespace))
    }

    /// Register a binary module in the manifest
    pub fn with_module(mut self, id: impl Into<ModuleId>, hash: impl Into<String>) -> Self {
        self.modules
            .insert(id.into(), ModuleDescriptor { hash: hash.into() });
        self
    }

    /// Register a chunk and its modules
    pub fn with_chunk(mut self, chunk: impl Into<String>, modules: &[&str]) -> Self {
        self.chunks.insert(
            chunk.into(),
            modules.iter().map(|&id| ModuleId::from(id)).collect(),
        );
        self
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load a config file, reporting read and parse failures
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `boot.toml` from the config directory.
    ///
    /// Returns defaults if the file doesn't exist or cannot be parsed.
    pub fn load_default() -> Self {
        config_dir()
            .and_then(|dir| std::fs::read_to_string(dir.join(CONFIG_FILE)).ok())
            .and_then(|content| Self::from_toml(&content).ok())
            .unwrap_or_default()
    }
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.nethercore", "", "NetherBoot")
        .map(|dirs| dirs.config_dir().to_path_buf())
}
