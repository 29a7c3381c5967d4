//! Test utilities
//!
//! An in-memory artifact source and small WAT modules shared by the loader and
//! sequencer tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use hashbrown::HashMap;

use crate::abi::{COMPANION_NAMESPACE, host_exports};
use crate::config::BootConfig;
use crate::error::FetchError;
use crate::fetch::{ArtifactSource, artifact_path};

#[derive(Default)]
struct MockInner {
    artifacts: RefCell<HashMap<String, Vec<u8>>>,
    failures: RefCell<HashMap<String, usize>>,
    fetches: RefCell<Vec<String>>,
    delay: Cell<Option<Duration>>,
}

/// In-memory artifact source that counts fetches.
///
/// Clones share state, so a test can keep a handle after moving one into a loader.
#[derive(Clone, Default)]
pub struct MockSource {
    inner: Rc<MockInner>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.inner.artifacts.borrow_mut().insert(path.into(), bytes);
    }

    /// Fail the next `times` fetches of `path` with a transport error
    pub fn fail_next(&self, path: impl Into<String>, times: usize) {
        self.inner.failures.borrow_mut().insert(path.into(), times);
    }

    /// Suspend every fetch for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        self.inner.delay.set(Some(delay));
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.inner
            .fetches
            .borrow()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    pub fn total_fetches(&self) -> usize {
        self.inner.fetches.borrow().len()
    }
}

impl ArtifactSource for MockSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.inner.fetches.borrow_mut().push(path.to_string());

        if let Some(delay) = self.inner.delay.get() {
            tokio::time::sleep(delay).await;
        }

        if let Some(remaining) = self.inner.failures.borrow_mut().get_mut(path)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(FetchError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
            });
        }

        self.inner
            .artifacts
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: path.to_string(),
                status: 404,
            })
    }
}

/// Register `bytes` as the artifact of `id` in both the config and the source
pub fn add_module(config: BootConfig, source: &MockSource, id: &str, hash: &str, bytes: Vec<u8>) -> BootConfig {
    source.insert(artifact_path(&config.public_path, hash), bytes);
    config.with_module(id, hash)
}

pub fn wat(text: &str) -> Vec<u8> {
    wat::parse_str(text).expect("invalid WAT")
}

/// A module with no imports exporting `add(a, b)` and `answer() = 42`
pub fn math_module() -> Vec<u8> {
    wat(r#"
        (module
            (func (export "add") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add)
            (func (export "answer") (result i32)
                i32.const 42))
    "#)
}

/// A game-shaped module importing from the companion.
///
/// Exports:
/// - `greet()`: alerts "Hello, snake!"
/// - `alert_oob()`: alerts with a pointer past the end of memory
/// - `fail()`: throws "game over" through the companion
/// - `trap()`: hits `unreachable`
/// - `is_undefined(h)`: forwards to `__wbindgen_is_undefined`
/// - `fill(ptr, len)`: fills memory with random bytes through `randomFillSync`
pub fn game_module() -> Vec<u8> {
    wat(&format!(
        r#"
        (module
            (import "{companion}" "{alert}" (func $alert (param i32 i32)))
            (import "{companion}" "{throw}" (func $throw (param i32 i32)))
            (import "{companion}" "{is_undefined}" (func $is_undefined (param i32) (result i32)))
            (import "{companion}" "{self_}" (func $self (result i32)))
            (import "{companion}" "{fill}" (func $fill (param i32 i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 16) "Hello, snake!")
            (data (i32.const 64) "game over")
            (func (export "greet")
                i32.const 16
                i32.const 13
                call $alert)
            (func (export "alert_oob")
                i32.const 70000
                i32.const 4
                call $alert)
            (func (export "fail")
                i32.const 64
                i32.const 9
                call $throw)
            (func (export "trap")
                unreachable)
            (func (export "is_undefined") (param i32) (result i32)
                local.get 0
                call $is_undefined)
            (func (export "fill") (param i32 i32)
                call $self
                local.get 0
                local.get 1
                call $fill))
    "#,
        companion = COMPANION_NAMESPACE,
        alert = host_exports::ALERT,
        throw = host_exports::THROW,
        is_undefined = host_exports::IS_UNDEFINED,
        self_ = host_exports::SELF,
        fill = host_exports::RANDOM_FILL_SYNC,
    ))
}

/// A module importing `f` from `import_id` and exporting its own `f`
pub fn cyclic_module(import_id: &str) -> Vec<u8> {
    wat(&format!(
        r#"
        (module
            (import "{import_id}" "f" (func $f))
            (func (export "f")
                call $f))
    "#
    ))
}

/// A module importing `add` from the wasm module `lib_id`
pub fn dependent_module(lib_id: &str) -> Vec<u8> {
    wat(&format!(
        r#"
        (module
            (import "{lib_id}" "add" (func $add (param i32 i32) (result i32)))
            (func (export "add_ten") (param i32) (result i32)
                local.get 0
                i32.const 10
                call $add))
    "#
    ))
}
