//! C runtime bindings.

use crate::ffi::{Failure, LazyLibrary, LazyProc};
use crate::native_fn;

/// The C runtime library.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub static LIBC: LazyLibrary = LazyLibrary::new("libSystem.B.dylib");

/// The C runtime library.
#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
pub static LIBC: LazyLibrary = LazyLibrary::new(LIBC_NAME);

#[cfg(all(target_os = "linux", target_env = "gnu"))]
const LIBC_NAME: &str = "libc.so.6";
#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios", all(target_os = "linux", target_env = "gnu")))))]
const LIBC_NAME: &str = "libc.so";

static GETPID: LazyProc = LIBC.proc("getpid");
static GETPPID: LazyProc = LIBC.proc("getppid");
static SYSCONF: LazyProc = LIBC.proc("sysconf");

/// `sysconf` name for the page size (`_SC_PAGESIZE`).
pub const SC_PAGESIZE: i32 = libc::_SC_PAGESIZE;

native_fn! {
    /// Process ID of the caller.
    pub fn getpid() -> i32 = GETPID, Failure::Never;

    /// Process ID of the caller's parent.
    pub fn getppid() -> i32 = GETPPID, Failure::Never;

    /// Runtime configuration value; `-1` reports failure through `errno`.
    ///
    /// An unsupported-but-valid name also returns `-1` with `errno`
    /// untouched, which surfaces as whatever code was last recorded (or
    /// the invalid-argument sentinel if none was).
    pub fn sysconf(name: i32) -> isize = SYSCONF, Failure::Sentinel(-1);
}
