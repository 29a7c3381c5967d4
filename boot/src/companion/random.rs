//! Secure random byte generation

use anyhow::Result;
use rand::RngCore;
use wasmtime::Val;

use super::{HostValue, arg, bad_argument, ret, value};
use crate::abi::host_exports as names;
use crate::wasm::BootState;

/// Largest request a single `getRandomValues` call may fill
pub const MAX_RANDOM_BYTES: usize = 65536;

/// `crypto.getRandomValues` as a value
pub(super) fn get_random_values_fn(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::GET_RANDOM_VALUES_FN, params, 0)?;
    let func = match value(names::GET_RANDOM_VALUES_FN, &state.heap, handle)? {
        HostValue::Crypto => HostValue::GetRandomValuesFn,
        _ => HostValue::Undefined,
    };
    let handle = state.heap.insert(func);
    ret(results, handle);
    Ok(())
}

/// `crypto.getRandomValues(array)`
pub(super) fn get_random_values(
    state: &mut BootState,
    memory: &mut [u8],
    params: &[Val],
    _results: &mut [Val],
) -> Result<()> {
    let crypto = arg(names::GET_RANDOM_VALUES, params, 0)?;
    let array = arg(names::GET_RANDOM_VALUES, params, 1)?;

    if !matches!(
        value(names::GET_RANDOM_VALUES, &state.heap, crypto)?,
        HostValue::Crypto
    ) {
        return Err(bad_argument(
            names::GET_RANDOM_VALUES,
            format!("handle {} is not a crypto provider", crypto),
        ));
    }
    let HostValue::Bytes(view) = value(names::GET_RANDOM_VALUES, &state.heap, array)?.clone() else {
        return Err(bad_argument(
            names::GET_RANDOM_VALUES,
            format!("handle {} is not a byte array", array),
        ));
    };
    if view.len > MAX_RANDOM_BYTES {
        return Err(bad_argument(
            names::GET_RANDOM_VALUES,
            format!("{} bytes requested, limit is {}", view.len, MAX_RANDOM_BYTES),
        ));
    }

    let rng = &mut state.rng;
    view.with_bytes_mut(memory, |bytes| rng.fill_bytes(bytes))
        .ok_or_else(|| bad_argument(names::GET_RANDOM_VALUES, "byte array is out of bounds"))
}

/// `crypto.randomFillSync(memory[ptr..ptr + len])`
pub(super) fn random_fill_sync(
    state: &mut BootState,
    memory: &mut [u8],
    params: &[Val],
    _results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::RANDOM_FILL_SYNC, params, 0)?;
    let ptr = arg(names::RANDOM_FILL_SYNC, params, 1)? as usize;
    let len = arg(names::RANDOM_FILL_SYNC, params, 2)? as usize;
    value(names::RANDOM_FILL_SYNC, &state.heap, handle)?;

    let bytes = ptr
        .checked_add(len)
        .and_then(|end| memory.get_mut(ptr..end))
        .ok_or_else(|| {
            bad_argument(
                names::RANDOM_FILL_SYNC,
                format!("range {}+{} out of bounds", ptr, len),
            )
        })?;
    state.rng.fill_bytes(bytes);
    Ok(())
}
