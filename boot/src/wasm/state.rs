//! Per-store host state
//!
//! Everything host functions can touch lives here: the shared module registry,
//! the guest memory recorded after instantiation, the object heap, the random
//! source and the alert history.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64;
use wasmtime::{Memory, ResourceLimiter};

use crate::companion::ObjectHeap;
use crate::registry::SharedRegistry;

/// Fallback linear memory limit (16MB)
pub const DEFAULT_RAM_LIMIT: usize = 16 * 1024 * 1024;

/// Host state stored in the wasmtime `Store`
pub struct BootState {
    /// Registry of the owning loader, used by import forwarders
    pub registry: SharedRegistry,

    /// Guest linear memory (set after instantiation)
    pub memory: Option<Memory>,

    /// Transient object table for values passed across the call boundary
    pub heap: ObjectHeap,

    /// Random source for `getRandomValues` / `randomFillSync`
    pub rng: Box<dyn RngCore>,

    /// Alerts raised by the guest, oldest first
    pub alerts: Vec<String>,

    /// Linear memory cap installed as the store limiter
    pub limits: MemoryLimiter,
}

impl BootState {
    /// Create state with an OS-seeded random source
    pub fn new(registry: SharedRegistry, ram_limit: usize) -> Self {
        Self::with_rng(registry, ram_limit, Box::new(StdRng::from_os_rng()))
    }

    /// Create state with a deterministic random source
    pub fn seeded(registry: SharedRegistry, ram_limit: usize, seed: u64) -> Self {
        Self::with_rng(registry, ram_limit, Box::new(Pcg64::seed_from_u64(seed)))
    }

    fn with_rng(registry: SharedRegistry, ram_limit: usize, rng: Box<dyn RngCore>) -> Self {
        Self {
            registry,
            memory: None,
            heap: ObjectHeap::new(),
            rng,
            alerts: Vec::new(),
            limits: MemoryLimiter::new(ram_limit),
        }
    }

    pub fn ram_limit(&self) -> usize {
        self.limits.ram_limit
    }
}

/// Caps guest linear memory growth.
///
/// Kept apart from the rest of the host state since wasmtime requires
/// limiters to be `Send`.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLimiter {
    ram_limit: usize,
}

impl MemoryLimiter {
    pub fn new(ram_limit: usize) -> Self {
        Self { ram_limit }
    }
}

impl ResourceLimiter for MemoryLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > self.ram_limit {
            tracing::warn!(
                "Guest memory growth from {} to {} bytes denied (limit {})",
                current,
                desired,
                self.ram_limit
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        Ok(maximum.is_none_or(|max| desired <= max))
    }
}
