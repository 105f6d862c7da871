//! Library Handles and Symbol Cache
//!
//! A [`LibraryHandle`] is the single process-lifetime instance for one
//! library name. It owns the loaded module (or the reason loading failed)
//! and an append-only cache of resolved export addresses.

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use super::error::{BindError, BindResult};
use super::loader::{NativeLoader, NativeModule};
use super::registry::Counters;
use super::types::Address;

/// Handle to a library acquired through the registry.
///
/// Cloning is cheap; all clones refer to the same instance and compare
/// equal. A handle whose library could not be loaded is still a handle,
/// it just fails every resolution with the original load error.
#[derive(Clone)]
pub struct LibraryHandle(Arc<LibraryEntry>);

struct LibraryEntry {
    name: String,
    module: Result<Box<dyn NativeModule>, BindError>,
    symbols: RwLock<HashMap<String, Arc<OnceCell<Address>>>>,
    counters: Arc<Counters>,
}

impl LibraryHandle {
    pub(crate) fn open(name: &str, loader: &dyn NativeLoader, counters: Arc<Counters>) -> Self {
        let module = loader.load(name);
        match &module {
            Ok(_) => {
                log::debug!("loaded library {}", name);
                counters.libraries_loaded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                log::warn!("{}", e);
                counters.load_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        Self(Arc::new(LibraryEntry {
            name: name.to_string(),
            module,
            symbols: RwLock::new(HashMap::new()),
            counters,
        }))
    }

    /// Name the library was acquired under
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether the library was loaded
    pub fn is_valid(&self) -> bool {
        self.0.module.is_ok()
    }

    /// Fail with the load error if the library was not loaded
    pub fn check(&self) -> BindResult<()> {
        self.module().map(|_| ())
    }

    fn module(&self) -> BindResult<&dyn NativeModule> {
        match &self.0.module {
            Ok(module) => Ok(module.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Resolve an exported symbol, caching the address on success.
    ///
    /// Names are matched exactly. A failed lookup is not cached, so a later
    /// call tries again; concurrent first resolutions of one name run the
    /// lookup once and all observe its result.
    pub fn resolve(&self, symbol: &str) -> BindResult<Address> {
        let module = self.module()?;
        if let Some(addr) = self.cached(symbol) {
            return Ok(addr);
        }

        let cell = self.symbol_cell(symbol);
        let resolved = cell
            .get_or_try_init(|| {
                let c_name = CString::new(symbol)
                    .map_err(|_| BindError::InvalidSymbolName(symbol.to_string()))?;
                let counters = &self.0.counters;
                match module.symbol(&c_name) {
                    Ok(addr) => {
                        log::debug!("resolved {}!{} at {}", self.0.name, symbol, addr);
                        counters.symbols_resolved.fetch_add(1, Ordering::Relaxed);
                        Ok(addr)
                    }
                    Err(e) => {
                        log::warn!("{}", e);
                        counters.lookup_failures.fetch_add(1, Ordering::Relaxed);
                        Err(e)
                    }
                }
            })
            .copied();
        if resolved.is_err() {
            self.discard(symbol, &cell);
        }
        resolved
    }

    /// Symbols resolved so far, sorted by name
    pub fn resolved_symbols(&self) -> Vec<(String, Address)> {
        let mut resolved: Vec<_> = self
            .0
            .symbols
            .read()
            .iter()
            .filter_map(|(name, cell)| cell.get().map(|addr| (name.clone(), *addr)))
            .collect();
        resolved.sort();
        resolved
    }

    fn cached(&self, symbol: &str) -> Option<Address> {
        self.0
            .symbols
            .read()
            .get(symbol)
            .and_then(|cell| cell.get().copied())
    }

    fn symbol_cell(&self, symbol: &str) -> Arc<OnceCell<Address>> {
        let mut symbols = self.0.symbols.write();
        Arc::clone(symbols.entry(symbol.to_string()).or_default())
    }

    /// Drop the slot a failed lookup left behind, unless another thread
    /// has filled or replaced it since.
    fn discard(&self, symbol: &str, cell: &Arc<OnceCell<Address>>) {
        let mut symbols = self.0.symbols.write();
        let stale = symbols
            .get(symbol)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && current.get().is_none());
        if stale {
            symbols.remove(symbol);
        }
    }
}

impl PartialEq for LibraryHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for LibraryHandle {}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("name", &self.0.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::loader::TableLoader;

    fn open(loader: &TableLoader) -> LibraryHandle {
        LibraryHandle::open("lib.dll", loader, Arc::new(Counters::default()))
    }

    fn slots(handle: &LibraryHandle) -> usize {
        handle.0.symbols.read().len()
    }

    #[test]
    fn test_failed_lookups_leave_no_slots() {
        let loader = TableLoader::new().library("lib.dll", &[("Found", 0x1000)]);
        let handle = open(&loader);

        for i in 0..32 {
            assert!(handle.resolve(&format!("Missing{}", i)).is_err());
        }
        assert!(handle.resolve("Bad\0Name").is_err());
        assert_eq!(slots(&handle), 0);

        assert_eq!(handle.resolve("Found"), Ok(Address::new(0x1000)));
        assert_eq!(slots(&handle), 1);
    }

    #[test]
    fn test_cached_resolve_skips_lookup() {
        let loader = TableLoader::new().library("lib.dll", &[("Found", 0x1000)]);
        let handle = open(&loader);

        for _ in 0..3 {
            assert_eq!(handle.resolve("Found"), Ok(Address::new(0x1000)));
        }
        assert_eq!(loader.lookup_count("lib.dll", "Found"), 1);
        assert_eq!(handle.0.counters.symbols_resolved.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_invalid_library_never_looks_up() {
        let loader = TableLoader::new();
        let handle = open(&loader);
        assert!(!handle.is_valid());
        assert!(matches!(
            handle.resolve("Found"),
            Err(BindError::LibraryNotFound { .. })
        ));
        assert_eq!(slots(&handle), 0);
        assert_eq!(handle.0.counters.load_failures.load(Ordering::Relaxed), 1);
    }
}
