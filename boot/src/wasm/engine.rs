//! WASM engine wrapper for compiling modules

use anyhow::{Context, Result};
use wasmtime::{Engine, ExternType, Module};

/// Shared WASM engine (one per loader context)
pub struct WasmEngine {
    engine: Engine,
}

impl WasmEngine {
    /// Create a new WASM engine with default configuration
    pub fn new() -> Result<Self> {
        let engine = Engine::default();
        Ok(Self { engine })
    }

    /// Get a reference to the underlying wasmtime engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a WASM module from bytes
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module> {
        Module::new(&self.engine, bytes).context("Failed to compile WASM module")
    }

    /// Validate that a module's declared memory fits the host limit
    ///
    /// Checked before instantiation so an oversized module fails with a clear
    /// message instead of a generic instantiation error.
    pub fn validate_module_memory(module: &Module, ram_limit: usize) -> Result<()> {
        let memories = module
            .exports()
            .map(|export| (export.name().to_string(), export.ty()))
            .chain(
                module
                    .imports()
                    .map(|import| (format!("{}::{}", import.module(), import.name()), import.ty())),
            );

        for (name, ty) in memories {
            if let ExternType::Memory(mem_type) = ty {
                let min_pages = mem_type.minimum();
                let min_bytes = min_pages as usize * 65536; // WASM pages are 64KB

                if min_bytes > ram_limit {
                    anyhow::bail!(
                        "memory '{}' requires {} bytes ({} pages) minimum, \
                         but the host only allows {} bytes",
                        name,
                        min_bytes,
                        min_pages,
                        ram_limit
                    );
                }

                if mem_type.maximum().is_none() {
                    tracing::debug!(
                        "Module memory '{}' has no maximum declared; host will limit to {} bytes",
                        name,
                        ram_limit
                    );
                }
            }
        }
        Ok(())
    }
}

// NOTE: WasmEngine intentionally does not implement Default.
// wasmtime::Engine creation is fallible on some platforms, so construction
// goes through WasmEngine::new() which returns Result<Self>.
