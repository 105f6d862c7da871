//! procbind - Lazy Native Library Bindings
//!
//! Calls functions exported by operating-system libraries that are loaded
//! on demand instead of linked at build time. Libraries and symbols are
//! resolved once per process and cached; calls go through fixed-arity
//! word trampolines that capture the thread's last-error code together
//! with the return value.
//!
//! # Features
//!
//! - **Lazy, idempotent loading**: one handle per library name, shared by every thread
//! - **Success-only symbol cache**: a missing export is retried, a found one never is
//! - **0 to 9 argument trampolines**: typed arguments are widened to machine words
//! - **Error translation**: last-error codes become [`NativeError`] values
//! - **Declarative wrappers**: [`native_fn!`] turns a [`LazyProc`] into a typed function
//!
//! # Example
//!
//! ```no_run
//! use procbind::{Bindings, Failure};
//!
//! let bindings = Bindings::global();
//! let libc = bindings.acquire_library("libc.so.6");
//! let getpid = bindings.resolve_symbol(&libc, "getpid")?;
//! let pid: i32 = unsafe { bindings.invoke(getpid, ())? }.check(Failure::Never)?;
//! assert_eq!(pid as u32, std::process::id());
//! # Ok::<(), procbind::BindError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  sys wrappers    │  native_fn! over LazyProc declarations
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    Bindings      │  library registry + symbol cache
//! └────────┬─────────┘
//!          │
//!     ┌────┴─────┐
//!     ▼          ▼
//! ┌────────┐  ┌────────────┐
//! │ Loader │  │ Trampoline │  (value, last error)
//! └────────┘  └─────┬──────┘
//!                   │
//!                   ▼
//! ┌──────────────────┐
//! │ Error translator │  0 / 997 / code
//! └──────────────────┘
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod ffi;
pub mod sys;

pub use config::{BindConfig, ConfigError, ConfigResult, LoaderConfig};
pub use ffi::{
    invoke, invoke_words, last_error, library_filename, parse_word, translate, Address,
    BindError, BindResult, BindingStats, Bindings, CallResult, Failure, FromWord, Handle,
    IntoWord, LazyLibrary, LazyProc, LibraryHandle, NativeError, NativeLoader, NativeModule,
    SystemLoader, TableLoader, Word, WordArgs, ERROR_EINVAL, ERROR_IO_PENDING, MAX_ARGS,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
