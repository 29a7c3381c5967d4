//! Import table construction and instantiation
//!
//! Host namespaces are satisfied with forwarders that look up the companion's
//! export at call time; wasm namespaces are satisfied from the dependency's
//! instance exports.

use std::rc::Rc;

use wasmtime::{Caller, Engine, ExternType, ImportType, Linker, Module, Val};

use crate::abi::MEMORY_EXPORT;
use crate::error::{ContractViolation, LoadError};
use crate::registry::{LoadState, ModuleId};
use crate::wasm::{BootState, HostModule, ModuleExports, SharedStore, Signature, WasmExports, with_host};

/// One import namespace of a module, resolved to a loaded export table
pub(super) struct ResolvedImport {
    /// Namespace as written in the module's import section
    pub namespace: String,
    /// Registry id the namespace maps to
    pub target: ModuleId,
    pub exports: Rc<ModuleExports>,
}

pub(super) type ResolvedImports = Vec<ResolvedImport>;

fn contract(module: &ModuleId, source: ContractViolation) -> LoadError {
    LoadError::Contract {
        module: module.clone(),
        source,
    }
}

/// Classify an instantiation or start-function failure
fn instantiate_error(module: &ModuleId, err: anyhow::Error) -> LoadError {
    match err.downcast_ref::<ContractViolation>() {
        Some(violation) => contract(module, violation.clone()),
        None => LoadError::Instantiate {
            module: module.clone(),
            reason: format!("{:#}", err),
        },
    }
}

/// Call a companion export on behalf of the guest
fn forward(
    caller: &mut Caller<'_, BootState>,
    companion: &ModuleId,
    name: &str,
    params: &[Val],
    results: &mut [Val],
) -> anyhow::Result<()> {
    let export = {
        let registry = caller.data().registry.borrow();
        match registry.host_export(companion, name) {
            Some(export) => export,
            None if registry.state(companion) != LoadState::Loaded => {
                return Err(ContractViolation::CompanionNotLoaded {
                    companion: companion.clone(),
                    name: name.to_string(),
                }
                .into());
            }
            None => {
                return Err(ContractViolation::MissingExport {
                    companion: companion.clone(),
                    name: name.to_string(),
                }
                .into());
            }
        }
    };
    with_host(caller, |state, memory| {
        export.call(name, state, memory, params, results)
    })
}

/// Define a forwarder for one import from a host namespace
fn define_forwarder(
    linker: &mut Linker<BootState>,
    module: &ModuleId,
    companion: &ModuleId,
    host: &HostModule,
    import: &ImportType<'_>,
) -> Result<(), LoadError> {
    let (namespace, name) = (import.module(), import.name());
    let unsupported = || {
        contract(
            module,
            ContractViolation::UnsupportedImport {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
        )
    };
    let ExternType::Func(func_ty) = import.ty() else {
        return Err(unsupported());
    };
    let Some(expected) = Signature::from_func_type(&func_ty) else {
        return Err(unsupported());
    };
    let export = host.get(name).ok_or_else(|| {
        contract(
            module,
            ContractViolation::MissingExport {
                companion: companion.clone(),
                name: name.to_string(),
            },
        )
    })?;
    if *export.signature() != expected {
        return Err(contract(
            module,
            ContractViolation::SignatureMismatch {
                companion: companion.clone(),
                name: name.to_string(),
                expected,
                actual: export.signature().clone(),
            },
        ));
    }

    let target = companion.clone();
    let target_name = name.to_string();
    linker
        .func_new(
            namespace,
            name,
            func_ty,
            move |mut caller: Caller<'_, BootState>, params: &[Val], results: &mut [Val]| {
                forward(&mut caller, &target, &target_name, params, results)
            },
        )
        .map_err(|e| LoadError::Instantiate {
            module: module.clone(),
            reason: format!("failed to define import '{}::{}': {:#}", namespace, name, e),
        })?;
    Ok(())
}

/// Build the import table for `module` and instantiate it into the shared store
pub(super) fn instantiate(
    engine: &Engine,
    store: &SharedStore,
    id: &ModuleId,
    module: &Module,
    resolved: &ResolvedImports,
) -> Result<ModuleExports, LoadError> {
    let mut linker: Linker<BootState> = Linker::new(engine);
    linker.allow_shadowing(true);

    let mut store_ref = store.borrow_mut();

    for import in module.imports() {
        let namespace = import.module();
        let Some(dependency) = resolved.iter().find(|r| r.namespace == namespace) else {
            return Err(LoadError::UnresolvedImport {
                module: id.clone(),
                namespace: namespace.to_string(),
            });
        };

        match dependency.exports.as_ref() {
            ModuleExports::Host(host) => {
                define_forwarder(&mut linker, id, &dependency.target, host, &import)?;
            }
            ModuleExports::Wasm(wasm) => {
                let item = wasm
                    .instance()
                    .get_export(&mut *store_ref, import.name())
                    .ok_or_else(|| LoadError::Instantiate {
                        module: id.clone(),
                        reason: format!(
                            "dependency '{}' does not export '{}'",
                            dependency.target,
                            import.name()
                        ),
                    })?;
                linker
                    .define(&*store_ref, namespace, import.name(), item)
                    .map_err(|e| instantiate_error(id, e))?;
            }
        }
        tracing::debug!("Linked import {}::{}", namespace, import.name());
    }

    let instance = linker
        .instantiate(&mut *store_ref, module)
        .map_err(|e| instantiate_error(id, e))?;

    if let Some(memory) = instance.get_memory(&mut *store_ref, MEMORY_EXPORT) {
        store_ref.data_mut().memory = Some(memory);
    }

    Ok(ModuleExports::Wasm(WasmExports::new(
        instance,
        Rc::clone(store),
    )))
}
