//! Dynamic Library Loader
//!
//! The seam between the binding caches and the platform loader.
//! [`SystemLoader`] wraps libloading; [`TableLoader`] serves in-process
//! export tables and counts every load and lookup.

use std::collections::HashMap;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;

use super::error::{BindError, BindResult};
use super::types::Address;
use crate::config::BindConfig;

/// A loaded native module that can look up exports by name.
pub trait NativeModule: Send + Sync {
    /// Look up an exported symbol. Called at most once per successful
    /// symbol by the cache above it.
    fn symbol(&self, name: &CStr) -> BindResult<Address>;
}

/// Something that can locate and load native libraries by name.
pub trait NativeLoader: Send + Sync {
    /// Load `name`. Called at most once per name by the registry.
    fn load(&self, name: &str) -> BindResult<Box<dyn NativeModule>>;
}

impl<L: NativeLoader + ?Sized> NativeLoader for Arc<L> {
    fn load(&self, name: &str) -> BindResult<Box<dyn NativeModule>> {
        (**self).load(name)
    }
}

// =============================================================================
// System Loader
// =============================================================================

/// Loader backed by the platform's dynamic loader.
#[derive(Debug, Clone)]
pub struct SystemLoader {
    /// Directories probed before the platform search
    search_paths: Vec<PathBuf>,
    /// Logical name -> file name
    aliases: HashMap<String, String>,
    /// Windows: restrict the platform search to System32
    #[cfg_attr(not(windows), allow(dead_code))]
    system_only: bool,
}

impl SystemLoader {
    /// Create a loader using only the platform search order
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            aliases: HashMap::new(),
            system_only: cfg!(windows),
        }
    }

    /// Create a loader from configuration
    pub fn from_config(config: &BindConfig) -> Self {
        let mut loader = Self::new();
        loader.system_only = config.loader.system_only;
        for path in &config.loader.search_paths {
            loader.add_search_path(path);
        }
        for (name, file) in &config.aliases {
            loader.add_alias(name.as_str(), file.as_str());
        }
        loader
    }

    /// Add a search path
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        self.search_paths.push(path.as_ref().to_path_buf());
    }

    /// Map a logical library name to a file name.
    ///
    /// Logical names follow the registry's case rules.
    pub fn add_alias(&mut self, name: &str, file: impl Into<String>) {
        self.aliases.insert(library_key(name), file.into());
    }

    /// File name a logical library name maps to
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases
            .get(&library_key(name))
            .map(String::as_str)
            .unwrap_or(name)
    }

    /// Find a library file in the configured search paths
    pub fn find_library(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.components().count() > 1 {
            return path.exists().then(|| path.to_path_buf());
        }

        let file_name = library_filename(name);
        self.search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.exists())
    }

    fn open(&self, name: &str) -> Result<Library, libloading::Error> {
        if let Some(path) = self.find_library(name) {
            log::debug!("loading {} from {}", name, path.display());
            // Safety: running a library's initializers is inherently trusted.
            return unsafe { Library::new(path) };
        }
        self.open_platform(name)
    }

    #[cfg(windows)]
    fn open_platform(&self, name: &str) -> Result<Library, libloading::Error> {
        use libloading::os::windows;

        if self.system_only {
            let lib = unsafe {
                windows::Library::load_with_flags(name, windows::LOAD_LIBRARY_SEARCH_SYSTEM32)?
            };
            return Ok(lib.into());
        }
        unsafe { Library::new(name) }
    }

    #[cfg(not(windows))]
    fn open_platform(&self, name: &str) -> Result<Library, libloading::Error> {
        unsafe { Library::new(name) }
    }
}

impl Default for SystemLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeLoader for SystemLoader {
    fn load(&self, name: &str) -> BindResult<Box<dyn NativeModule>> {
        let file = self.resolve_alias(name);
        match self.open(file) {
            Ok(library) => Ok(Box::new(SystemModule {
                name: file.to_string(),
                library,
            })),
            Err(e) => Err(BindError::LibraryNotFound {
                library: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

struct SystemModule {
    name: String,
    library: Library,
}

impl NativeModule for SystemModule {
    fn symbol(&self, name: &CStr) -> BindResult<Address> {
        // Safety: the address is only ever called through a trampoline whose
        // signature the caller vouches for.
        let symbol = unsafe { self.library.get::<*const ()>(name.to_bytes_with_nul()) };
        match symbol {
            Ok(symbol) => Ok(Address::from(*symbol)),
            Err(e) => {
                log::debug!("lookup of {:?} in {} failed: {}", name, self.name, e);
                Err(BindError::SymbolNotFound {
                    library: self.name.clone(),
                    symbol: name.to_string_lossy().into_owned(),
                })
            }
        }
    }
}

/// Key a library name is registered and aliased under.
///
/// Windows resolves module names case-insensitively; elsewhere file names
/// are case-sensitive.
pub(crate) fn library_key(name: &str) -> String {
    if cfg!(windows) {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    }
}

/// Construct the platform-specific library filename
pub fn library_filename(name: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        if name.starts_with("lib") && name.contains(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }

    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(target_os = "windows")]
    {
        if name.to_ascii_lowercase().ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        name.to_string()
    }
}

// =============================================================================
// Table Loader
// =============================================================================

/// Loader over in-process export tables.
///
/// Each registered library maps symbol names to addresses, typically of
/// `extern "system"` functions compiled into the host. Load and lookup
/// counts are kept per name.
#[derive(Default)]
pub struct TableLoader {
    tables: HashMap<String, HashMap<String, Address>>,
    loads: Mutex<HashMap<String, usize>>,
    lookups: Arc<Mutex<HashMap<(String, String), usize>>>,
}

impl TableLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library and its exports
    pub fn library(mut self, name: &str, exports: &[(&str, usize)]) -> Self {
        let table = exports
            .iter()
            .map(|&(symbol, addr)| (symbol.to_string(), Address::new(addr)))
            .collect();
        self.tables.insert(name.to_string(), table);
        self
    }

    /// How many times `name` was loaded
    pub fn load_count(&self, name: &str) -> usize {
        self.loads.lock().get(name).copied().unwrap_or(0)
    }

    /// How many times `symbol` was looked up in `library`
    pub fn lookup_count(&self, library: &str, symbol: &str) -> usize {
        self.lookups
            .lock()
            .get(&(library.to_string(), symbol.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl NativeLoader for TableLoader {
    fn load(&self, name: &str) -> BindResult<Box<dyn NativeModule>> {
        *self.loads.lock().entry(name.to_string()).or_default() += 1;
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| BindError::LibraryNotFound {
                library: name.to_string(),
                reason: "no export table registered".to_string(),
            })?;
        Ok(Box::new(TableModule {
            name: name.to_string(),
            exports: table.clone(),
            lookups: Arc::clone(&self.lookups),
        }))
    }
}

struct TableModule {
    name: String,
    exports: HashMap<String, Address>,
    lookups: Arc<Mutex<HashMap<(String, String), usize>>>,
}

impl NativeModule for TableModule {
    fn symbol(&self, name: &CStr) -> BindResult<Address> {
        let symbol = name.to_string_lossy().into_owned();
        *self
            .lookups
            .lock()
            .entry((self.name.clone(), symbol.clone()))
            .or_default() += 1;
        self.exports
            .get(&symbol)
            .copied()
            .ok_or_else(|| BindError::SymbolNotFound {
                library: self.name.clone(),
                symbol,
            })
    }
}
