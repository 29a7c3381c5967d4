//! Object heap exports: globals, arrays, wrapped guest structs

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use wasmtime::Val;

use super::{HostValue, arg, bad_argument, read_str, ret, value};
use crate::abi::host_exports as names;
use crate::error::GuestThrow;
use crate::wasm::BootState;

/// Wrap a guest `Vector` pointer as a heap object
pub(super) fn vector_new(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let ptr = arg(names::VECTOR_NEW, params, 0)?;
    let handle = state.heap.insert(HostValue::Wrapped {
        class: "Vector",
        ptr,
    });
    ret(results, handle);
    Ok(())
}

pub(super) fn object_drop_ref(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    _results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::OBJECT_DROP_REF, params, 0)?;
    state.heap.drop_ref(handle);
    Ok(())
}

pub(super) fn global_self(
    state: &mut BootState,
    _memory: &mut [u8],
    _params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = state.heap.insert(HostValue::Global);
    ret(results, handle);
    Ok(())
}

/// `obj.crypto`: the global object carries a crypto provider, nothing else does
pub(super) fn crypto(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::CRYPTO, params, 0)?;
    let crypto = match value(names::CRYPTO, &state.heap, handle)? {
        HostValue::Global => HostValue::Crypto,
        _ => HostValue::Undefined,
    };
    let handle = state.heap.insert(crypto);
    ret(results, handle);
    Ok(())
}

/// `obj.msCrypto` is never present
pub(super) fn ms_crypto(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::MS_CRYPTO, params, 0)?;
    value(names::MS_CRYPTO, &state.heap, handle)?;
    let handle = state.heap.insert(HostValue::Undefined);
    ret(results, handle);
    Ok(())
}

pub(super) fn is_undefined(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::IS_UNDEFINED, params, 0)?;
    let undefined = value(names::IS_UNDEFINED, &state.heap, handle)?.is_undefined();
    ret(results, undefined as u32);
    Ok(())
}

/// `module.require(name)`; only the crypto module resolves
pub(super) fn require(
    state: &mut BootState,
    memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = arg(names::REQUIRE, params, 0)?;
    let ptr = arg(names::REQUIRE, params, 1)?;
    let len = arg(names::REQUIRE, params, 2)?;
    value(names::REQUIRE, &state.heap, handle)?;

    let module = read_str(names::REQUIRE, memory, ptr, len)?;
    if module != "crypto" {
        return Err(GuestThrow {
            message: format!("Cannot find module '{}'", module),
        }
        .into());
    }
    let handle = state.heap.insert(HostValue::Crypto);
    ret(results, handle);
    Ok(())
}

pub(super) fn static_module(
    state: &mut BootState,
    _memory: &mut [u8],
    _params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = state.heap.insert(HostValue::Module);
    ret(results, handle);
    Ok(())
}

pub(super) fn array_new(
    state: &mut BootState,
    _memory: &mut [u8],
    _params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let handle = state
        .heap
        .insert(HostValue::Array(Rc::new(RefCell::new(Vec::new()))));
    ret(results, handle);
    Ok(())
}

/// `array.push(value)`, returning the new length
pub(super) fn array_push(
    state: &mut BootState,
    _memory: &mut [u8],
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let array = arg(names::ARRAY_PUSH, params, 0)?;
    let item = arg(names::ARRAY_PUSH, params, 1)?;

    let item = value(names::ARRAY_PUSH, &state.heap, item)?.clone();
    let HostValue::Array(items) = value(names::ARRAY_PUSH, &state.heap, array)? else {
        return Err(bad_argument(names::ARRAY_PUSH, format!("handle {} is not an array", array)));
    };
    let mut items = items.borrow_mut();
    items.push(item);
    ret(results, items.len() as u32);
    Ok(())
}
