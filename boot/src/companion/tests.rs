//! Tests for the companion host module, called directly without wasm

use wasmtime::Val;

use super::*;
use crate::abi::host_exports as names;
use crate::error::{ContractViolation, GuestFault, GuestThrow};
use crate::registry::ModuleRegistry;
use crate::wasm::DEFAULT_RAM_LIMIT;

struct Harness {
    module: HostModule,
    state: BootState,
    memory: Vec<u8>,
}

impl Harness {
    fn new() -> Self {
        Self::seeded(1)
    }

    fn seeded(seed: u64) -> Self {
        Self {
            module: companion_module(),
            state: BootState::seeded(ModuleRegistry::shared(), DEFAULT_RAM_LIMIT, seed),
            memory: vec![0; 1024],
        }
    }

    fn call(&mut self, name: &str, args: &[u32]) -> Result<Option<u32>> {
        let export = self.module.get(name).unwrap().clone();
        let params: Vec<Val> = args.iter().map(|&a| Val::I32(a as i32)).collect();
        let mut results: Vec<Val> = export
            .signature()
            .results
            .iter()
            .map(|ty| ty.default_val())
            .collect();
        export.call(name, &mut self.state, &mut self.memory, &params, &mut results)?;
        Ok(results.first().map(|v| v.unwrap_i32() as u32))
    }

    /// Call an export that returns a value and expect success
    fn get(&mut self, name: &str, args: &[u32]) -> u32 {
        self.call(name, args).unwrap().unwrap()
    }

    fn write(&mut self, ptr: usize, bytes: &[u8]) {
        self.memory[ptr..ptr + bytes.len()].copy_from_slice(bytes);
    }

    fn crypto(&mut self) -> u32 {
        let global = self.get(names::SELF, &[]);
        self.get(names::CRYPTO, &[global])
    }
}

fn assert_bad_argument(err: anyhow::Error) {
    assert!(err.downcast_ref::<GuestFault>().is_some(), "{err:#}");
    assert!(err.downcast_ref::<ContractViolation>().is_none(), "{err:#}");
}

// ============================================================================
// Export surface
// ============================================================================

#[test]
fn test_companion_provides_every_contract_export() {
    let module = companion_module();
    assert_eq!(module.len(), names::ALL.len());
    for name in names::ALL {
        let export = module.get(name).unwrap_or_else(|| panic!("missing {name}"));
        assert!(export.signature().results.len() <= 1);
    }
}

#[test]
fn test_declared_signatures() {
    let module = companion_module();
    assert_eq!(*module.get(names::ALERT).unwrap().signature(), Signature::i32s(2, false));
    assert_eq!(*module.get(names::REQUIRE).unwrap().signature(), Signature::i32s(3, true));
    assert_eq!(*module.get(names::SELF).unwrap().signature(), Signature::i32s(0, true));
    assert_eq!(
        *module.get(names::GET_RANDOM_VALUES).unwrap().signature(),
        Signature::i32s(2, false)
    );
}

#[test]
fn test_wrong_arity_is_contract_violation() {
    let mut h = Harness::new();
    let err = h.call(names::IS_UNDEFINED, &[]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ContractViolation>(),
        Some(ContractViolation::ArityMismatch { params: 0, results: 1, .. })
    ));
}

// ============================================================================
// Objects
// ============================================================================

#[test]
fn test_global_has_crypto_but_no_ms_crypto() {
    let mut h = Harness::new();
    let global = h.get(names::SELF, &[]);
    assert!(global >= HEAP_RESERVED);

    let crypto = h.get(names::CRYPTO, &[global]);
    assert_eq!(h.get(names::IS_UNDEFINED, &[crypto]), 0);

    let ms_crypto = h.get(names::MS_CRYPTO, &[global]);
    assert_eq!(h.get(names::IS_UNDEFINED, &[ms_crypto]), 1);
}

#[test]
fn test_crypto_of_non_global_is_undefined() {
    let mut h = Harness::new();
    let crypto = h.get(names::CRYPTO, &[NULL]);
    assert_eq!(h.get(names::IS_UNDEFINED, &[crypto]), 1);
}

#[test]
fn test_reserved_values() {
    let mut h = Harness::new();
    assert_eq!(h.get(names::IS_UNDEFINED, &[UNDEFINED]), 1);
    assert_eq!(h.get(names::IS_UNDEFINED, &[NULL]), 0);
    assert_eq!(h.get(names::IS_UNDEFINED, &[TRUE]), 0);
    assert_eq!(h.get(names::IS_UNDEFINED, &[FALSE]), 0);
}

#[test]
fn test_dropped_handles_are_reused_lifo() {
    let mut h = Harness::new();
    let a = h.get(names::SELF, &[]);
    let b = h.get(names::SELF, &[]);

    h.call(names::OBJECT_DROP_REF, &[a]).unwrap();
    h.call(names::OBJECT_DROP_REF, &[b]).unwrap();
    assert_eq!(h.state.heap.live_count(), 0);

    assert_eq!(h.get(names::ARRAY_NEW, &[]), b);
    assert_eq!(h.get(names::ARRAY_NEW, &[]), a);
}

#[test]
fn test_dropping_reserved_handle_is_noop() {
    let mut h = Harness::new();
    h.call(names::OBJECT_DROP_REF, &[UNDEFINED]).unwrap();
    assert_eq!(h.get(names::IS_UNDEFINED, &[UNDEFINED]), 1);
}

#[test]
fn test_dead_handle_is_bad_argument() {
    let mut h = Harness::new();
    let handle = h.get(names::SELF, &[]);
    h.call(names::OBJECT_DROP_REF, &[handle]).unwrap();

    assert_bad_argument(h.call(names::IS_UNDEFINED, &[handle]).unwrap_err());
    assert_bad_argument(h.call(names::IS_UNDEFINED, &[999]).unwrap_err());
}

#[test]
fn test_vector_new_wraps_pointer() {
    let mut h = Harness::new();
    let handle = h.get(names::VECTOR_NEW, &[128]);
    assert!(matches!(
        h.state.heap.get(handle),
        Some(HostValue::Wrapped { class: "Vector", ptr: 128 })
    ));
}

#[test]
fn test_array_push_returns_length() {
    let mut h = Harness::new();
    let array = h.get(names::ARRAY_NEW, &[]);
    let item = h.get(names::SELF, &[]);

    assert_eq!(h.get(names::ARRAY_PUSH, &[array, item]), 1);
    assert_eq!(h.get(names::ARRAY_PUSH, &[array, TRUE]), 2);
    assert_bad_argument(h.call(names::ARRAY_PUSH, &[item, TRUE]).unwrap_err());
}

#[test]
fn test_require_crypto() {
    let mut h = Harness::new();
    let module = h.get(names::STATIC_ACCESSOR_MODULE, &[]);
    h.write(0, b"crypto");

    let crypto = h.get(names::REQUIRE, &[module, 0, 6]);
    assert!(matches!(h.state.heap.get(crypto), Some(HostValue::Crypto)));

    let func = h.get(names::GET_RANDOM_VALUES_FN, &[crypto]);
    assert_eq!(h.get(names::IS_UNDEFINED, &[func]), 0);
}

#[test]
fn test_require_unknown_module_throws() {
    let mut h = Harness::new();
    let module = h.get(names::STATIC_ACCESSOR_MODULE, &[]);
    h.write(0, b"fs");

    let err = h.call(names::REQUIRE, &[module, 0, 2]).unwrap_err();
    let thrown = err.downcast_ref::<GuestThrow>().unwrap();
    assert!(thrown.message.contains("'fs'"));
}

// ============================================================================
// Randomness
// ============================================================================

#[test]
fn test_get_random_values_fills_owned_buffer() {
    let mut h = Harness::new();
    let crypto = h.crypto();
    let array = h.get(names::UINT8_ARRAY_NEW_WITH_LENGTH, &[32]);

    h.call(names::GET_RANDOM_VALUES, &[crypto, array]).unwrap();

    let Some(HostValue::Bytes(view)) = h.state.heap.get(array) else {
        panic!("expected byte array");
    };
    let bytes = view.read(&h.memory).unwrap();
    assert_eq!(bytes.len(), 32);
    assert_ne!(bytes, vec![0u8; 32]);
}

#[test]
fn test_get_random_values_requires_crypto() {
    let mut h = Harness::new();
    let global = h.get(names::SELF, &[]);
    let array = h.get(names::UINT8_ARRAY_NEW_WITH_LENGTH, &[8]);
    assert_bad_argument(h.call(names::GET_RANDOM_VALUES, &[global, array]).unwrap_err());
}

#[test]
fn test_get_random_values_limit() {
    let mut h = Harness::new();
    let crypto = h.crypto();
    let array = h.get(names::UINT8_ARRAY_NEW_WITH_LENGTH, &[65537]);
    assert_bad_argument(h.call(names::GET_RANDOM_VALUES, &[crypto, array]).unwrap_err());
}

#[test]
fn test_random_fill_sync_is_seeded() {
    let mut first = Harness::seeded(42);
    let mut second = Harness::seeded(42);
    for h in [&mut first, &mut second] {
        let crypto = h.crypto();
        h.call(names::RANDOM_FILL_SYNC, &[crypto, 512, 64]).unwrap();
    }
    assert_eq!(first.memory[512..576], second.memory[512..576]);
    assert_ne!(first.memory[512..576], [0u8; 64]);
    assert!(first.memory[..512].iter().all(|&b| b == 0));
}

#[test]
fn test_random_fill_sync_out_of_bounds() {
    let mut h = Harness::new();
    let crypto = h.crypto();
    assert_bad_argument(h.call(names::RANDOM_FILL_SYNC, &[crypto, 1000, 64]).unwrap_err());
}

// ============================================================================
// Memory and byte buffers
// ============================================================================

fn memory_view(h: &mut Harness) -> u32 {
    let memory = h.get(names::MEMORY, &[]);
    let buffer = h.get(names::BUFFER, &[memory]);
    h.get(names::UINT8_ARRAY_NEW, &[buffer])
}

#[test]
fn test_memory_view_spans_guest_memory() {
    let mut h = Harness::new();
    let view = memory_view(&mut h);
    assert_eq!(h.get(names::UINT8_ARRAY_LENGTH, &[view]), 1024);
}

#[test]
fn test_view_over_non_buffer_is_bad_argument() {
    let mut h = Harness::new();
    let global = h.get(names::SELF, &[]);
    assert_bad_argument(h.call(names::UINT8_ARRAY_NEW, &[global]).unwrap_err());
}

#[test]
fn test_subarray_is_clamped() {
    let mut h = Harness::new();
    let view = memory_view(&mut h);

    let tail = h.get(names::UINT8_ARRAY_SUBARRAY, &[view, 1000, 5000]);
    assert_eq!(h.get(names::UINT8_ARRAY_LENGTH, &[tail]), 24);

    let empty = h.get(names::UINT8_ARRAY_SUBARRAY, &[view, 10, 5]);
    assert_eq!(h.get(names::UINT8_ARRAY_LENGTH, &[empty]), 0);
}

#[test]
fn test_set_copies_host_buffer_into_memory() {
    let mut h = Harness::new();
    let crypto = h.crypto();
    let source = h.get(names::UINT8_ARRAY_NEW_WITH_LENGTH, &[16]);
    h.call(names::GET_RANDOM_VALUES, &[crypto, source]).unwrap();

    let view = memory_view(&mut h);
    let target = h.get(names::UINT8_ARRAY_SUBARRAY, &[view, 100, 116]);
    h.call(names::UINT8_ARRAY_SET, &[target, source, 0]).unwrap();

    let Some(HostValue::Bytes(source_view)) = h.state.heap.get(source) else {
        panic!("expected byte array");
    };
    let expected = source_view.read(&h.memory).unwrap();
    assert_eq!(h.memory[100..116], expected[..]);
}

#[test]
fn test_set_overflow_is_bad_argument() {
    let mut h = Harness::new();
    let source = h.get(names::UINT8_ARRAY_NEW_WITH_LENGTH, &[16]);
    let target = h.get(names::UINT8_ARRAY_NEW_WITH_LENGTH, &[8]);
    assert_bad_argument(h.call(names::UINT8_ARRAY_SET, &[target, source, 0]).unwrap_err());
}

#[test]
fn test_new_with_length_respects_ram_limit() {
    let mut h = Harness::new();
    let too_big = DEFAULT_RAM_LIMIT as u32 + 1;
    assert_bad_argument(
        h.call(names::UINT8_ARRAY_NEW_WITH_LENGTH, &[too_big])
            .unwrap_err(),
    );
}

// ============================================================================
// System
// ============================================================================

#[test]
fn test_alert_records_message() {
    let mut h = Harness::new();
    h.write(200, "Hello, snake!".as_bytes());
    h.call(names::ALERT, &[200, 13]).unwrap();
    assert_eq!(h.state.alerts, vec!["Hello, snake!".to_string()]);
}

#[test]
fn test_alert_rejects_invalid_utf8() {
    let mut h = Harness::new();
    h.write(0, &[0xff, 0xfe]);
    assert_bad_argument(h.call(names::ALERT, &[0, 2]).unwrap_err());
    assert!(h.state.alerts.is_empty());
}

#[test]
fn test_alert_out_of_bounds() {
    let mut h = Harness::new();
    assert_bad_argument(h.call(names::ALERT, &[1020, 10]).unwrap_err());
}

#[test]
fn test_throw_carries_guest_message() {
    let mut h = Harness::new();
    h.write(0, b"game over");
    let err = h.call(names::THROW, &[0, 9]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<GuestThrow>(),
        Some(&GuestThrow {
            message: "game over".to_string()
        })
    );
}
