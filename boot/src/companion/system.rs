//! Alerts and guest exceptions

use anyhow::Result;
use wasmtime::Val;

use super::{arg, read_str};
use crate::abi::host_exports as names;
use crate::error::GuestThrow;
use crate::wasm::BootState;

/// Show a user-visible alert
pub(super) fn alert(
    state: &mut BootState,
    memory: &mut [u8],
    params: &[Val],
    _results: &mut [Val],
) -> Result<()> {
    let ptr = arg(names::ALERT, params, 0)?;
    let len = arg(names::ALERT, params, 1)?;
    let message = read_str(names::ALERT, memory, ptr, len)?;
    tracing::info!("[ALERT] {}", message);
    state.alerts.push(message.to_string());
    Ok(())
}

/// Abort the current guest call with the guest's message
pub(super) fn throw(
    _state: &mut BootState,
    memory: &mut [u8],
    params: &[Val],
    _results: &mut [Val],
) -> Result<()> {
    let ptr = arg(names::THROW, params, 0)?;
    let len = arg(names::THROW, params, 1)?;
    let message = read_str(names::THROW, memory, ptr, len)?.to_string();
    Err(GuestThrow { message }.into())
}
