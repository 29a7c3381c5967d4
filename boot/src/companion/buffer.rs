//! Guest memory objects and byte arrays

use anyhow::Result;
use wasmtime::Val;

use super::{ByteView, HostValue, arg, bad_argument, ret, value};
use crate::abi::host_exports as names;
use crate::wasm::BootState;

fn byte_view(name: &str, state: &BootState, handle: u32) -> Result<ByteView> {
    match value(name, &state.heap, handle)? {
        HostValue::Bytes(view) => Ok(view.clone()),
        _ => Err(bad_argument(name, format!("handle {} is not a byte array", handle))),
    }
}

/// The guest memory object
pub(super) fn memory(
    state: &mut BootState,
    _memory: &mut [u8],
    _params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = state.heap.insert(HostValue::Memory);
    ret(results, handle);
    Ok(())
}

/// `memory.buffer`
pub(super) fn buffer(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::BUFFER, params, 0)?;
    let buffer = match value(names::BUFFER, &state.heap, handle)? {
        HostValue::Memory => HostValue::MemoryBuffer,
        _ => HostValue::Undefined,
    };
    let handle = state.heap.insert(buffer);
    ret(results, handle);
    Ok(())
}

/// `new Uint8Array(memory.buffer)`: a view over all of guest memory
pub(super) fn uint8_array_new(
    state: &mut BootState,
    memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::UINT8_ARRAY_NEW, params, 0)?;
    if !matches!(
        value(names::UINT8_ARRAY_NEW, &state.heap, handle)?,
        HostValue::MemoryBuffer
    ) {
        return Err(bad_argument(
            names::UINT8_ARRAY_NEW,
            format!("handle {} is not a memory buffer", handle),
        ));
    }
    let handle = state
        .heap
        .insert(HostValue::Bytes(ByteView::memory(memory.len())));
    ret(results, handle);
    Ok(())
}

/// `new Uint8Array(len)`: a zeroed host-owned buffer
pub(super) fn uint8_array_new_with_length(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let len = arg(names::UINT8_ARRAY_NEW_WITH_LENGTH, params, 0)? as usize;
    if len > state.ram_limit() {
        return Err(bad_argument(
            names::UINT8_ARRAY_NEW_WITH_LENGTH,
            format!("{} bytes exceeds the host memory limit", len),
        ));
    }
    let handle = state.heap.insert(HostValue::Bytes(ByteView::owned(len)));
    ret(results, handle);
    Ok(())
}

/// `target.set(source, offset)`
pub(super) fn uint8_array_set(
    state: &mut BootState,
    memory: &mut [u8],
    params: &[Val],
    _results: &mut [Val],
) -> Result<()> {
    let target = arg(names::UINT8_ARRAY_SET, params, 0)?;
    let source = arg(names::UINT8_ARRAY_SET, params, 1)?;
    let offset = arg(names::UINT8_ARRAY_SET, params, 2)? as usize;

    let target = byte_view(names::UINT8_ARRAY_SET, state, target)?;
    let source = byte_view(names::UINT8_ARRAY_SET, state, source)?;

    let data = source
        .read(memory)
        .ok_or_else(|| bad_argument(names::UINT8_ARRAY_SET, "source is out of bounds"))?;
    if offset
        .checked_add(data.len())
        .is_none_or(|end| end > target.len)
    {
        return Err(bad_argument(
            names::UINT8_ARRAY_SET,
            format!(
                "{} bytes at offset {} overflow a {} byte array",
                data.len(),
                offset,
                target.len
            ),
        ));
    }

    target
        .subarray(offset, offset + data.len())
        .with_bytes_mut(memory, |bytes| bytes.copy_from_slice(&data))
        .ok_or_else(|| bad_argument(names::UINT8_ARRAY_SET, "target is out of bounds"))
}

pub(super) fn uint8_array_length(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::UINT8_ARRAY_LENGTH, params, 0)?;
    let view = byte_view(names::UINT8_ARRAY_LENGTH, state, handle)?;
    ret(results, view.len as u32);
    Ok(())
}

/// `array.subarray(start, end)`
pub(super) fn uint8_array_subarray(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::UINT8_ARRAY_SUBARRAY, params, 0)?;
    let start = arg(names::UINT8_ARRAY_SUBARRAY, params, 1)? as usize;
    let end = arg(names::UINT8_ARRAY_SUBARRAY, params, 2)? as usize;

    let view = byte_view(names::UINT8_ARRAY_SUBARRAY, state, handle)?;
    let handle = state
        .heap
        .insert(HostValue::Bytes(view.subarray(start, end)));
    ret(results, handle);
    Ok(())
}
