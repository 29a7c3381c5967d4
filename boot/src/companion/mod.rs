//! Companion host module
//!
//! The binary module imports its host primitives from a companion module:
//! secure randomness, the object heap, alerts and byte buffers. The import
//! table forwards every such import here by name.

mod buffer;
mod heap;
mod objects;
mod random;
mod system;

#[cfg(test)]
mod tests;

pub use heap::{
    Backing, ByteView, FALSE, HEAP_RESERVED, HostValue, NULL, ObjectHeap, TRUE, UNDEFINED,
};

use anyhow::Result;
use wasmtime::Val;

use crate::abi::host_exports;
use crate::error::GuestFault;
use crate::wasm::{BootState, HostExport, HostModule, Signature};

type Body = fn(&mut BootState, &mut [u8], &[Val], &mut [Val]) -> Result<()>;

fn export(params: usize, has_result: bool, body: Body) -> HostExport {
    HostExport::new(Signature::i32s(params, has_result), body)
}

/// Build the companion module with every export the binary module expects
pub fn companion_module() -> HostModule {
    HostModule::new()
        // Objects
        .with(host_exports::VECTOR_NEW, export(1, true, objects::vector_new))
        .with(host_exports::OBJECT_DROP_REF, export(1, false, objects::object_drop_ref))
        .with(host_exports::SELF, export(0, true, objects::global_self))
        .with(host_exports::CRYPTO, export(1, true, objects::crypto))
        .with(host_exports::MS_CRYPTO, export(1, true, objects::ms_crypto))
        .with(host_exports::IS_UNDEFINED, export(1, true, objects::is_undefined))
        .with(host_exports::REQUIRE, export(3, true, objects::require))
        .with(host_exports::STATIC_ACCESSOR_MODULE, export(0, true, objects::static_module))
        .with(host_exports::ARRAY_NEW, export(0, true, objects::array_new))
        .with(host_exports::ARRAY_PUSH, export(2, true, objects::array_push))
        // Randomness
        .with(host_exports::GET_RANDOM_VALUES_FN, export(1, true, random::get_random_values_fn))
        .with(host_exports::GET_RANDOM_VALUES, export(2, false, random::get_random_values))
        .with(host_exports::RANDOM_FILL_SYNC, export(3, false, random::random_fill_sync))
        // Memory and byte buffers
        .with(host_exports::MEMORY, export(0, true, buffer::memory))
        .with(host_exports::BUFFER, export(1, true, buffer::buffer))
        .with(host_exports::UINT8_ARRAY_NEW, export(1, true, buffer::uint8_array_new))
        .with(host_exports::UINT8_ARRAY_NEW_WITH_LENGTH, export(1, true, buffer::uint8_array_new_with_length))
        .with(host_exports::UINT8_ARRAY_SET, export(3, false, buffer::uint8_array_set))
        .with(host_exports::UINT8_ARRAY_LENGTH, export(1, true, buffer::uint8_array_length))
        .with(host_exports::UINT8_ARRAY_SUBARRAY, export(3, true, buffer::uint8_array_subarray))
        // System
        .with(host_exports::ALERT, export(2, false, system::alert))
        .with(host_exports::THROW, export(2, false, system::throw))
}

fn bad_argument(name: &str, reason: impl Into<String>) -> anyhow::Error {
    GuestFault {
        name: name.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// Read the `i`th i32 argument, reinterpreted as `u32` (handles, pointers, lengths)
fn arg(name: &str, params: &[Val], i: usize) -> Result<u32> {
    params
        .get(i)
        .and_then(Val::i32)
        .map(|v| v as u32)
        .ok_or_else(|| bad_argument(name, format!("argument {} is not an i32", i)))
}

/// Resolve a handle argument to its heap value
fn value<'a>(name: &str, heap: &'a ObjectHeap, handle: u32) -> Result<&'a HostValue> {
    heap.get(handle)
        .ok_or_else(|| bad_argument(name, format!("handle {} is not live", handle)))
}

fn ret(results: &mut [Val], v: u32) {
    results[0] = Val::I32(v as i32);
}

/// Decode a UTF-8 string from guest memory
fn read_str<'a>(name: &str, memory: &'a [u8], ptr: u32, len: u32) -> Result<&'a str> {
    let start = ptr as usize;
    let bytes = start
        .checked_add(len as usize)
        .and_then(|end| memory.get(start..end))
        .ok_or_else(|| bad_argument(name, format!("string {}+{} out of bounds", ptr, len)))?;
    std::str::from_utf8(bytes).map_err(|e| bad_argument(name, format!("invalid UTF-8: {}", e)))
}
