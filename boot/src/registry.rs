//! Module registry
//!
//! Tracks every module a loader context knows about: absent (unloaded),
//! loading (with the shared in-flight handle) or loaded (with its exports).
//! Owned by a [`crate::Loader`] and shared with the wasm store so host
//! forwarders can resolve companion exports at call time.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::LoadError;
use crate::wasm::{HostExport, ModuleExports};

/// Opaque module identifier (e.g. `../pkg/game_bg.wasm`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Observable loading state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Outcome delivered to every waiter of a load
pub type LoadResult = Result<Rc<ModuleExports>, LoadError>;

/// Shared in-flight handle; `None` until the load task finishes
pub type PendingLoad = watch::Receiver<Option<LoadResult>>;

enum Slot {
    Loading(PendingLoad),
    Loaded(Rc<ModuleExports>),
}

/// Registry handle shared between the loader and the wasm store
pub type SharedRegistry = Rc<RefCell<ModuleRegistry>>;

/// Module id -> loading state and exports
#[derive(Default)]
pub struct ModuleRegistry {
    slots: HashMap<ModuleId, Slot>,
    /// In-flight loads -> dependencies they are waiting on
    waits: HashMap<ModuleId, Vec<ModuleId>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn state(&self, id: &ModuleId) -> LoadState {
        match self.slots.get(id) {
            None => LoadState::Unloaded,
            Some(Slot::Loading(_)) => LoadState::Loading,
            Some(Slot::Loaded(_)) => LoadState::Loaded,
        }
    }

    /// Export table of a loaded module
    pub fn exports(&self, id: &ModuleId) -> Option<Rc<ModuleExports>> {
        match self.slots.get(id) {
            Some(Slot::Loaded(exports)) => Some(Rc::clone(exports)),
            _ => None,
        }
    }

    /// In-flight handle of a loading module
    pub fn pending(&self, id: &ModuleId) -> Option<PendingLoad> {
        match self.slots.get(id) {
            Some(Slot::Loading(rx)) => Some(rx.clone()),
            _ => None,
        }
    }

    /// Look up a host function exported by a loaded host module
    pub fn host_export(&self, companion: &ModuleId, name: &str) -> Option<HostExport> {
        match self.exports(companion)?.as_ref() {
            ModuleExports::Host(module) => module.get(name).cloned(),
            ModuleExports::Wasm(_) => None,
        }
    }

    /// Mark a module as loading. Only valid from the unloaded state.
    pub(crate) fn begin_loading(&mut self, id: ModuleId, pending: PendingLoad) {
        debug_assert_eq!(self.state(&id), LoadState::Unloaded);
        self.slots.insert(id, Slot::Loading(pending));
    }

    /// Record a finished load
    pub(crate) fn complete(&mut self, id: ModuleId, exports: Rc<ModuleExports>) {
        self.waits.remove(&id);
        self.slots.insert(id, Slot::Loaded(exports));
    }

    /// Forget a failed load so the next request starts from scratch
    pub(crate) fn fail(&mut self, id: &ModuleId) {
        self.waits.remove(id);
        if matches!(self.slots.get(id), Some(Slot::Loading(_))) {
            self.slots.remove(id);
        }
    }

    /// Drop an entry in any state
    #[cfg(test)]
    pub(crate) fn evict(&mut self, id: &ModuleId) {
        self.waits.remove(id);
        self.slots.remove(id);
    }

    /// Record that the load of `module` waits on `dependency`.
    ///
    /// Returns `false` without recording anything if `dependency` already
    /// waits on `module`, directly or transitively.
    pub(crate) fn add_wait(&mut self, module: &ModuleId, dependency: &ModuleId) -> bool {
        if self.waits_on(dependency, module) {
            return false;
        }
        self.waits
            .entry(module.clone())
            .or_default()
            .push(dependency.clone());
        true
    }

    fn waits_on(&self, from: &ModuleId, to: &ModuleId) -> bool {
        let mut stack = vec![from];
        let mut seen: HashSet<&ModuleId> = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id)
                && let Some(next) = self.waits.get(id)
            {
                stack.extend(next);
            }
        }
        false
    }
}
