//! Binding Registry
//!
//! The process-scoped service behind every binding: one
//! [`LibraryHandle`] per library name, created on first acquisition and
//! kept for the life of the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use super::error::BindResult;
use super::library::LibraryHandle;
use super::loader::{library_key, NativeLoader, SystemLoader};
use super::trampoline::{self, CallResult, WordArgs};
use super::types::Address;
use crate::config::BindConfig;

static GLOBAL: OnceCell<Bindings> = OnceCell::new();

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) libraries_loaded: AtomicU64,
    pub(crate) load_failures: AtomicU64,
    pub(crate) symbols_resolved: AtomicU64,
    pub(crate) lookup_failures: AtomicU64,
}

/// Snapshot of registry activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingStats {
    /// Libraries loaded successfully
    pub libraries_loaded: u64,
    /// Libraries that could not be loaded
    pub load_failures: u64,
    /// Symbols resolved successfully
    pub symbols_resolved: u64,
    /// Symbol lookups that failed
    pub lookup_failures: u64,
}

/// Registry of lazily loaded libraries and their resolved symbols.
///
/// Entries are only ever added. The first acquisition of a name loads the
/// library while concurrent acquirers of the same name wait for it; every
/// later acquisition is a read-locked map lookup.
pub struct Bindings {
    loader: Box<dyn NativeLoader>,
    libraries: RwLock<HashMap<String, Arc<OnceCell<LibraryHandle>>>>,
    counters: Arc<Counters>,
}

impl Bindings {
    /// Create a registry backed by the platform loader
    pub fn new() -> Self {
        Self::with_loader(SystemLoader::new())
    }

    /// Create a registry whose platform loader honors `config`
    pub fn with_config(config: &BindConfig) -> Self {
        Self::with_loader(SystemLoader::from_config(config))
    }

    /// Create a registry over any loader
    pub fn with_loader(loader: impl NativeLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            libraries: RwLock::new(HashMap::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// The process-wide registry used by [`LazyLibrary`](super::LazyLibrary).
    ///
    /// Created with [`Bindings::new`] on first use unless
    /// [`Bindings::install`] ran earlier.
    pub fn global() -> &'static Bindings {
        GLOBAL.get_or_init(Bindings::new)
    }

    /// Make `bindings` the process-wide registry.
    ///
    /// Fails, handing `bindings` back, once the global registry exists.
    pub fn install(bindings: Bindings) -> Result<(), Bindings> {
        GLOBAL.set(bindings)
    }

    /// Acquire the handle for `name`, loading the library on first use.
    ///
    /// Never fails: a library that cannot be loaded yields an invalid
    /// handle whose resolutions report the load error.
    pub fn acquire_library(&self, name: &str) -> LibraryHandle {
        let key = library_key(name);
        let existing = self.libraries.read().get(&key).cloned();
        let cell = match existing {
            Some(cell) => cell,
            None => Arc::clone(self.libraries.write().entry(key).or_default()),
        };
        cell.get_or_init(|| {
            LibraryHandle::open(name, self.loader.as_ref(), Arc::clone(&self.counters))
        })
        .clone()
    }

    /// Resolve `symbol` in `library`. See [`LibraryHandle::resolve`].
    pub fn resolve_symbol(&self, library: &LibraryHandle, symbol: &str) -> BindResult<Address> {
        library.resolve(symbol)
    }

    /// Invoke a resolved address. See [`trampoline::invoke`].
    ///
    /// # Safety
    ///
    /// The signature implied by `args` must match the function at
    /// `address`.
    pub unsafe fn invoke<A: WordArgs>(&self, address: Address, args: A) -> BindResult<CallResult> {
        trampoline::invoke(address, args)
    }

    /// Names acquired so far, sorted
    pub fn loaded_libraries(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .libraries
            .read()
            .values()
            .filter_map(|cell| cell.get().map(|lib| lib.name().to_string()))
            .collect();
        names.sort();
        names
    }

    /// Activity counters
    pub fn stats(&self) -> BindingStats {
        let c = &self.counters;
        BindingStats {
            libraries_loaded: c.libraries_loaded.load(Ordering::Relaxed),
            load_failures: c.load_failures.load(Ordering::Relaxed),
            symbols_resolved: c.symbols_resolved.load(Ordering::Relaxed),
            lookup_failures: c.lookup_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for Bindings {
    fn default() -> Self {
        Self::new()
    }
}
