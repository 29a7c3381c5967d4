//! Coalescing async module loader
//!
//! Each module id is fetched, compiled and instantiated at most once per
//! loader. Concurrent requests for the same id share one in-flight load task.
//! Loads run as `spawn_local` tasks, so every async method must be driven from
//! inside a [`tokio::task::LocalSet`].

mod link;


use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use wasmtime::{Module, Store, Val};

use crate::config::BootConfig;
use crate::error::{ContractViolation, LoadError};
use crate::fetch::{ArtifactSource, artifact_path};
use crate::registry::{LoadResult, LoadState, ModuleId, ModuleRegistry, PendingLoad, SharedRegistry};
use crate::wasm::{BootState, HostModule, ModuleExports, SharedStore, WasmEngine, with_host};

use link::{ResolvedImport, ResolvedImports};

/// Either a finished module or a handle to wait on
enum Begun {
    Loaded(Rc<ModuleExports>),
    Pending(PendingLoad),
}

struct Inner<S> {
    config: BootConfig,
    source: S,
    engine: WasmEngine,
    registry: SharedRegistry,
    store: SharedStore,
}

/// Loader context: the module registry, the wasm store and an artifact source
pub struct Loader<S> {
    inner: Rc<Inner<S>>,
}

impl<S> Clone for Loader<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: ArtifactSource + 'static> Loader<S> {
    /// Create a loader with an empty registry
    pub fn new(config: BootConfig, source: S) -> Result<Self> {
        let engine = WasmEngine::new()?;
        let registry = ModuleRegistry::shared();

        let state = match config.random_seed {
            Some(seed) => BootState::seeded(Rc::clone(&registry), config.ram_limit, seed),
            None => BootState::new(Rc::clone(&registry), config.ram_limit),
        };
        let mut store = Store::new(engine.engine(), state);
        store.limiter(|state| &mut state.limits);

        Ok(Self {
            inner: Rc::new(Inner {
                config,
                source,
                engine,
                registry,
                store: Rc::new(RefCell::new(store)),
            }),
        })
    }

    pub fn config(&self) -> &BootConfig {
        &self.inner.config
    }

    pub fn state(&self, id: &ModuleId) -> LoadState {
        self.inner.registry.borrow().state(id)
    }

    pub fn exports(&self, id: &ModuleId) -> Option<Rc<ModuleExports>> {
        self.inner.registry.borrow().exports(id)
    }

    /// Run `f` with the store's host state (alerts, heap, rng)
    pub fn with_state<R>(&self, f: impl FnOnce(&mut BootState) -> R) -> R {
        f(self.inner.store.borrow_mut().data_mut())
    }

    /// Install a host module directly in the loaded state
    pub fn register_host_module(&self, id: impl Into<ModuleId>, module: HostModule) -> Rc<ModuleExports> {
        let id = id.into();
        tracing::debug!("Registered host module '{}' ({} exports)", id, module.len());
        let exports = Rc::new(ModuleExports::Host(module));
        self.inner
            .registry
            .borrow_mut()
            .complete(id, Rc::clone(&exports));
        exports
    }

    /// Call a host module export directly, bypassing any import table
    pub fn call_host(&self, companion: &ModuleId, name: &str, args: &[Val]) -> Result<Vec<Val>> {
        let export = self
            .inner
            .registry
            .borrow()
            .host_export(companion, name)
            .ok_or_else(|| ContractViolation::MissingExport {
                companion: companion.clone(),
                name: name.to_string(),
            })?;
        let mut results: Vec<Val> = export
            .signature()
            .results
            .iter()
            .map(|ty| ty.default_val())
            .collect();

        let mut store = self.inner.store.borrow_mut();
        with_host(&mut *store, |state, memory| {
            export.call(name, state, memory, args, &mut results)
        })?;
        Ok(results)
    }

    /// Load a module, or return it if it is already loaded or in flight
    pub async fn load(&self, id: impl Into<ModuleId>) -> LoadResult {
        let id = id.into();
        match self.begin(&id) {
            Begun::Loaded(exports) => Ok(exports),
            Begun::Pending(mut pending) => wait(&id, &mut pending).await,
        }
    }

    /// Load every module of a chunk concurrently, returning exports in manifest order
    pub async fn load_chunk(&self, chunk: &str) -> Result<Vec<Rc<ModuleExports>>, LoadError> {
        let ids = self
            .inner
            .config
            .chunks
            .get(chunk)
            .cloned()
            .unwrap_or_default();
        if ids.is_empty() {
            tracing::debug!("Chunk '{}' has no modules", chunk);
        }

        // Start every load before waiting on any of them
        let begun: Vec<(ModuleId, Begun)> = ids
            .into_iter()
            .map(|id| {
                let begun = self.begin(&id);
                (id, begun)
            })
            .collect();

        let mut exports = Vec::with_capacity(begun.len());
        for (id, begun) in begun {
            exports.push(match begun {
                Begun::Loaded(loaded) => loaded,
                Begun::Pending(mut pending) => wait(&id, &mut pending).await?,
            });
        }
        Ok(exports)
    }

    fn begin(&self, id: &ModuleId) -> Begun {
        let mut registry = self.inner.registry.borrow_mut();
        if let Some(exports) = registry.exports(id) {
            return Begun::Loaded(exports);
        }
        if let Some(pending) = registry.pending(id) {
            tracing::debug!("Joining in-flight load of '{}'", id);
            return Begun::Pending(pending);
        }

        let (tx, rx) = watch::channel(None);
        registry.begin_loading(id.clone(), rx.clone());
        drop(registry);

        tracing::debug!("Loading module '{}'", id);
        tokio::task::spawn_local(self.clone().run_load(id.clone(), tx));
        Begun::Pending(rx)
    }

    async fn run_load(self, id: ModuleId, tx: watch::Sender<Option<LoadResult>>) {
        let result = self.load_uncached(&id).await;
        {
            let mut registry = self.inner.registry.borrow_mut();
            match &result {
                Ok(exports) => {
                    registry.complete(id.clone(), Rc::clone(exports));
                    tracing::info!("Module '{}' loaded", id);
                }
                Err(err) => {
                    registry.fail(&id);
                    tracing::error!("Failed to load module '{}': {}", id, err);
                }
            }
        }
        tx.send_replace(Some(result));
    }

    async fn load_uncached(&self, id: &ModuleId) -> LoadResult {
        let descriptor = self
            .inner
            .config
            .modules
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::UnknownModule(id.clone()))?;
        let path = artifact_path(&self.inner.config.public_path, &descriptor.hash);

        let timeout = self.inner.config.load_timeout();
        let module = match tokio::time::timeout(timeout, self.fetch_and_compile(id, &path)).await {
            Ok(module) => module?,
            Err(_) => {
                return Err(LoadError::Timeout {
                    module: id.clone(),
                    after: timeout,
                });
            }
        };

        let resolved = self.resolve_imports(id, &module).await?;
        let exports = link::instantiate(
            self.inner.engine.engine(),
            &self.inner.store,
            id,
            &module,
            &resolved,
        )?;
        Ok(Rc::new(exports))
    }

    async fn fetch_and_compile(&self, id: &ModuleId, path: &str) -> Result<Module, LoadError> {
        tracing::debug!("Fetching '{}' from {}", id, path);
        let bytes = self
            .inner
            .source
            .fetch(path)
            .await
            .map_err(|source| LoadError::Fetch {
                module: id.clone(),
                source: Arc::new(source),
            })?;

        let module = self
            .inner
            .engine
            .load_module(&bytes)
            .map_err(|e| LoadError::Compile {
                module: id.clone(),
                reason: format!("{:#}", e),
            })?;
        WasmEngine::validate_module_memory(&module, self.inner.config.ram_limit).map_err(|e| {
            LoadError::MemoryLimit {
                module: id.clone(),
                reason: format!("{:#}", e),
            }
        })?;
        Ok(module)
    }

    /// Resolve each import namespace to a loaded module, loading manifest dependencies first
    async fn resolve_imports(&self, id: &ModuleId, module: &Module) -> Result<ResolvedImports, LoadError> {
        let mut namespaces: Vec<String> = Vec::new();
        for import in module.imports() {
            if !namespaces.iter().any(|ns| ns == import.module()) {
                namespaces.push(import.module().to_string());
            }
        }

        let mut resolved = ResolvedImports::with_capacity(namespaces.len());
        for namespace in namespaces {
            let target = self.inner.config.resolve_namespace(&namespace);
            let exports = match self.exports(&target) {
                Some(exports) => exports,
                None => self.load_dependency(id, &target).await?,
            };
            resolved.push(ResolvedImport {
                namespace,
                target,
                exports,
            });
        }
        Ok(resolved)
    }

    async fn load_dependency(&self, id: &ModuleId, dependency: &ModuleId) -> LoadResult {
        if !self.inner.config.modules.contains_key(dependency) {
            return Err(LoadError::UnresolvedImport {
                module: id.clone(),
                namespace: dependency.to_string(),
            });
        }
        if !self.inner.registry.borrow_mut().add_wait(id, dependency) {
            return Err(LoadError::CyclicImport {
                module: id.clone(),
                namespace: dependency.clone(),
            });
        }

        self.load(dependency.clone())
            .await
            .map_err(|source| LoadError::Dependency {
                module: id.clone(),
                source: Box::new(source),
            })
    }
}

async fn wait(id: &ModuleId, pending: &mut PendingLoad) -> LoadResult {
    let outcome = match pending.wait_for(Option::is_some).await {
        Ok(result) => (*result).clone(),
        Err(_) => None,
    };
    outcome.unwrap_or_else(|| {
        Err(LoadError::Instantiate {
            module: id.clone(),
            reason: "load task ended without a result".to_string(),
        })
    })
}
