//! Generated Call Sites
//!
//! Typed wrappers over well-known system libraries, declared with
//! [`native_fn!`](crate::native_fn). Each one is a lazy binding: nothing
//! is loaded until the wrapper is first called.

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use unix::LIBC;

#[cfg(windows)]
pub use windows::KERNEL32;

/// Identifier of the calling process, through the platform's C runtime or
/// kernel library.
#[cfg(any(unix, windows))]
pub fn current_process_id() -> crate::BindResult<u32> {
    #[cfg(unix)]
    {
        unix::getpid().map(|pid| pid as u32)
    }
    #[cfg(windows)]
    {
        windows::get_current_process_id()
    }
}
