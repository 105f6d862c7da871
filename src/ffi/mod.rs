//! Native Binding Core
//!
//! Calls functions exported by dynamically loaded system libraries without
//! linking against them.
//!
//! # Architecture
//!
//! ```text
//! Typed wrapper (native_fn!)
//!       │
//!       ▼
//! LazyProc ──► Bindings::acquire_library ──► LibraryHandle (one per name)
//!       │                                          │
//!       │            resolve_symbol ◄──────────────┘ (cached on success)
//!       ▼
//! Call Trampoline (0..=9 words) ──► (value, last error)
//!       │
//!       ▼
//! Failure convention ──► translate(code) ──► NativeError
//! ```
//!
//! # Example
//!
//! ```ignore
//! let bindings = Bindings::global();
//! let libc = bindings.acquire_library("libc.so.6");
//! let getpid = bindings.resolve_symbol(&libc, "getpid")?;
//! let result = unsafe { bindings.invoke(getpid, ())? };
//! let pid: i32 = result.check(Failure::Never)?;
//! ```

mod error;
mod lazy;
mod library;
mod loader;
mod registry;
mod trampoline;
mod types;

pub use error::{
    translate, BindError, BindResult, NativeError, ERROR_EINVAL, ERROR_IO_PENDING,
    ERROR_IO_PENDING_CODE,
};
pub use lazy::{LazyLibrary, LazyProc};
pub use library::LibraryHandle;
pub use loader::{library_filename, NativeLoader, NativeModule, SystemLoader, TableLoader};
pub use registry::{BindingStats, Bindings};
pub use trampoline::{
    invoke, invoke_words, last_error, CallResult, Failure, WordArgs, MAX_ARGS,
};
pub use types::{parse_word, Address, FromWord, Handle, IntoWord, Word};

#[cfg(test)]
mod tests;
