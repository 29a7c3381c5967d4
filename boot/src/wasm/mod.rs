//! WASM runtime wrapper
//!
//! Provides abstractions over wasmtime for compiling game modules, holding
//! per-store host state and describing module export tables.

mod engine;
mod exports;
mod state;


pub use engine::WasmEngine;
pub use exports::{
    HostExport, HostFn, HostModule, ModuleExports, SharedStore, Signature, WasmExports, WasmType,
};
pub use state::{BootState, DEFAULT_RAM_LIMIT, MemoryLimiter};

use wasmtime::AsContextMut;

/// Run `f` with the host state and the recorded guest memory borrowed together.
///
/// Before any module has exported a memory, `f` sees an empty slice.
pub fn with_host<R>(
    mut ctx: impl AsContextMut<Data = BootState>,
    f: impl FnOnce(&mut BootState, &mut [u8]) -> R,
) -> R {
    let mut ctx = ctx.as_context_mut();
    let memory = ctx.data().memory;
    match memory {
        Some(memory) => {
            let (bytes, state) = memory.data_and_store_mut(&mut ctx);
            f(state, bytes)
        }
        None => f(ctx.data_mut(), &mut []),
    }
}
