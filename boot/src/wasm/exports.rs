//! Export tables of loaded modules
//!
//! A module in the registry is either a host module (Rust functions with a
//! declared signature) or an instantiated wasm module sharing the loader's store.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use anyhow::{Context, Result};
use hashbrown::HashMap;
use wasmtime::{FuncType, Instance, Store, Val, ValType};

use super::state::BootState;
use crate::error::ContractViolation;

/// Store shared by every wasm module of one loader context
pub type SharedStore = Rc<RefCell<Store<BootState>>>;

/// Numeric value types allowed across the host boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmType {
    I32,
    I64,
    F32,
    F64,
}

impl WasmType {
    fn from_val_type(ty: &ValType) -> Option<Self> {
        match ty {
            ValType::I32 => Some(Self::I32),
            ValType::I64 => Some(Self::I64),
            ValType::F32 => Some(Self::F32),
            ValType::F64 => Some(Self::F64),
            _ => None,
        }
    }

    /// Zero value of this type, used to size result buffers
    pub fn default_val(self) -> Val {
        match self {
            Self::I32 => Val::I32(0),
            Self::I64 => Val::I64(0),
            Self::F32 => Val::F32(0),
            Self::F64 => Val::F64(0),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

/// Parameter and result types of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<WasmType>,
    pub results: Vec<WasmType>,
}

impl Signature {
    pub fn new(params: &[WasmType], results: &[WasmType]) -> Self {
        Self {
            params: params.to_vec(),
            results: results.to_vec(),
        }
    }

    /// `n` i32 params and an optional i32 result (the shape of every companion export)
    pub fn i32s(params: usize, has_result: bool) -> Self {
        Self {
            params: vec![WasmType::I32; params],
            results: if has_result {
                vec![WasmType::I32]
            } else {
                Vec::new()
            },
        }
    }

    /// Convert a wasmtime function type; `None` if it uses non-numeric types
    pub fn from_func_type(ty: &FuncType) -> Option<Self> {
        let params = ty
            .params()
            .map(|p| WasmType::from_val_type(&p))
            .collect::<Option<Vec<_>>>()?;
        let results = ty
            .results()
            .map(|r| WasmType::from_val_type(&r))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { params, results })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[WasmType]| {
            types
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "({}) -> ({})", join(&self.params), join(&self.results))
    }
}

/// Host function body: state, guest memory (empty before a memory is recorded), args, results
pub type HostFn = dyn Fn(&mut BootState, &mut [u8], &[Val], &mut [Val]) -> Result<()>;

/// A named host function with its declared signature
#[derive(Clone)]
pub struct HostExport {
    signature: Signature,
    func: Rc<HostFn>,
}

impl HostExport {
    pub fn new(
        signature: Signature,
        func: impl Fn(&mut BootState, &mut [u8], &[Val], &mut [Val]) -> Result<()> + 'static,
    ) -> Self {
        Self {
            signature,
            func: Rc::new(func),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invoke the host function after checking argument and result arity
    pub fn call(
        &self,
        name: &str,
        state: &mut BootState,
        memory: &mut [u8],
        params: &[Val],
        results: &mut [Val],
    ) -> Result<()> {
        if params.len() != self.signature.params.len()
            || results.len() != self.signature.results.len()
        {
            return Err(ContractViolation::ArityMismatch {
                name: name.to_string(),
                params: params.len(),
                results: results.len(),
                declared: self.signature.clone(),
            }
            .into());
        }
        (self.func)(state, memory, params, results)
    }
}

impl fmt::Debug for HostExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostExport")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A module implemented by the host
#[derive(Default, Debug, Clone)]
pub struct HostModule {
    exports: HashMap<String, HostExport>,
}

impl HostModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, export: HostExport) {
        self.exports.insert(name.into(), export);
    }

    pub fn with(mut self, name: impl Into<String>, export: HostExport) -> Self {
        self.insert(name, export);
        self
    }

    pub fn get(&self, name: &str) -> Option<&HostExport> {
        self.exports.get(name)
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// An instantiated wasm module
pub struct WasmExports {
    instance: Instance,
    store: SharedStore,
}

impl WasmExports {
    pub(crate) fn new(instance: Instance, store: SharedStore) -> Self {
        Self { instance, store }
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    pub fn has_export(&self, name: &str) -> bool {
        let mut store = self.store.borrow_mut();
        self.instance.get_func(&mut *store, name).is_some()
    }

    /// Names of every export, in declaration order
    pub fn export_names(&self) -> Vec<String> {
        let mut store = self.store.borrow_mut();
        self.instance
            .exports(&mut *store)
            .map(|export| export.name().to_string())
            .collect()
    }

    /// Call an exported function by name
    pub fn call(&self, name: &str, args: &[Val]) -> Result<Vec<Val>> {
        let mut store = self.store.borrow_mut();
        let func = self
            .instance
            .get_func(&mut *store, name)
            .ok_or_else(|| anyhow::anyhow!("Function '{}' not exported", name))?;
        let mut results: Vec<Val> = func
            .ty(&*store)
            .results()
            .map(|ty| {
                WasmType::from_val_type(&ty)
                    .map(WasmType::default_val)
                    .unwrap_or(Val::I32(0))
            })
            .collect();
        func.call(&mut *store, args, &mut results)
            .with_context(|| format!("WASM {}() failed", name))?;
        Ok(results)
    }
}

/// Export table stored in the registry
pub enum ModuleExports {
    Host(HostModule),
    Wasm(WasmExports),
}

impl ModuleExports {
    pub fn as_wasm(&self) -> Option<&WasmExports> {
        match self {
            Self::Wasm(exports) => Some(exports),
            Self::Host(_) => None,
        }
    }
}

impl fmt::Debug for ModuleExports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(module) => f.debug_tuple("Host").field(&module.names()).finish(),
            Self::Wasm(_) => f.write_str("Wasm(..)"),
        }
    }
}
