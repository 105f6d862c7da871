//! Call Trampoline
//!
//! Fixed-arity dispatch through a resolved address. Every argument is one
//! machine word, the return value is one machine word, and the calling
//! thread's last-error code is captured in the same step as the call.
//!
//! Arities 0 through [`MAX_ARGS`] are generated by `word_args!` for tuples
//! of [`IntoWord`] values, so `invoke(addr, (a, b, c))` picks the
//! three-word trampoline at compile time.

use super::error::{translate, BindError, BindResult};
use super::types::{Address, FromWord, IntoWord, Word};

/// Widest call any trampoline supports.
pub const MAX_ARGS: usize = 9;

/// Outcome of one native call. Consumed immediately by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct CallResult {
    /// Primary return value, uninterpreted
    pub value: Word,
    /// Last-error code captured right after the call returned
    pub last_error: u32,
}

/// How a wrapped function signals failure through its return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure<T = Word> {
    /// Result is not checked (void-like calls)
    Never,
    /// A zero return means failure
    Zero,
    /// A non-zero return means failure
    NonZero,
    /// This exact value means failure (e.g. `-1`)
    Sentinel(T),
}

impl CallResult {
    /// Primary value converted to `R`
    #[inline]
    pub fn value<R: FromWord>(&self) -> R {
        R::from_word(self.value)
    }

    /// Apply a failure convention to the typed return value.
    ///
    /// The error translator runs only when `failure` says the call failed.
    pub fn check<R>(self, failure: Failure<R>) -> BindResult<R>
    where
        R: FromWord + Default + PartialEq,
    {
        let value = R::from_word(self.value);
        let failed = match failure {
            Failure::Never => false,
            Failure::Zero => value == R::default(),
            Failure::NonZero => value != R::default(),
            Failure::Sentinel(ref sentinel) => value == *sentinel,
        };
        if failed {
            return Err(BindError::Native(translate(self.last_error)));
        }
        Ok(value)
    }
}

/// A tuple of word-convertible arguments with a matching trampoline.
pub trait WordArgs {
    /// Number of machine words passed
    const ARITY: usize;

    /// Call `address` with these arguments and capture the last error.
    ///
    /// # Safety
    ///
    /// `address` must be non-null and point at a function taking exactly
    /// `ARITY` word-sized arguments in the platform calling convention,
    /// and the arguments must be valid for that function.
    unsafe fn dispatch(self, address: Word) -> CallResult;
}

macro_rules! word {
    ($arg:ident) => {
        Word
    };
}

macro_rules! word_args {
    ($arity:literal; $($arg:ident),*) => {
        impl<$($arg: IntoWord),*> WordArgs for ($($arg,)*) {
            const ARITY: usize = $arity;

            #[inline]
            #[allow(non_snake_case)]
            unsafe fn dispatch(self, address: Word) -> CallResult {
                let ($($arg,)*) = self;
                let f: unsafe extern "system" fn($(word!($arg)),*) -> Word =
                    std::mem::transmute(address);
                let value = f($($arg.into_word()),*);
                let last_error = last_error::get();
                CallResult { value, last_error }
            }
        }
    };
}

word_args!(0;);
word_args!(1; A);
word_args!(2; A, B);
word_args!(3; A, B, C);
word_args!(4; A, B, C, D);
word_args!(5; A, B, C, D, E);
word_args!(6; A, B, C, D, E, F);
word_args!(7; A, B, C, D, E, F, G);
word_args!(8; A, B, C, D, E, F, G, H);
word_args!(9; A, B, C, D, E, F, G, H, I);

/// Invoke `address` with a tuple of typed arguments.
///
/// A null address fails with [`BindError::NullAddress`] and no call is
/// made. The primary value is not interpreted.
///
/// # Safety
///
/// The signature implied by `args` is trusted: `address` must be a function
/// taking exactly that many word-sized arguments, and the arguments must
/// satisfy whatever the function requires of them.
#[inline]
pub unsafe fn invoke<A: WordArgs>(address: Address, args: A) -> BindResult<CallResult> {
    if address.is_null() {
        return Err(BindError::NullAddress);
    }
    let result = args.dispatch(address.as_usize());
    log::trace!(
        "invoke {} ({} args) -> {:#x}, last error {}",
        address,
        A::ARITY,
        result.value,
        result.last_error
    );
    Ok(result)
}

/// Invoke `address` with a runtime-sized argument list.
///
/// Picks the trampoline matching `args.len()`.
///
/// # Safety
///
/// Same contract as [`invoke`].
pub unsafe fn invoke_words(address: Address, args: &[Word]) -> BindResult<CallResult> {
    match *args {
        [] => invoke(address, ()),
        [a] => invoke(address, (a,)),
        [a, b] => invoke(address, (a, b)),
        [a, b, c] => invoke(address, (a, b, c)),
        [a, b, c, d] => invoke(address, (a, b, c, d)),
        [a, b, c, d, e] => invoke(address, (a, b, c, d, e)),
        [a, b, c, d, e, f] => invoke(address, (a, b, c, d, e, f)),
        [a, b, c, d, e, f, g] => invoke(address, (a, b, c, d, e, f, g)),
        [a, b, c, d, e, f, g, h] => invoke(address, (a, b, c, d, e, f, g, h)),
        [a, b, c, d, e, f, g, h, i] => invoke(address, (a, b, c, d, e, f, g, h, i)),
        _ => Err(BindError::TooManyArguments {
            got: args.len(),
            max: MAX_ARGS,
        }),
    }
}

/// Per-thread last-error code: `GetLastError` on Windows, `errno` on Unix.
pub mod last_error {
    #[cfg(windows)]
    #[link(name = "kernel32")]
    extern "system" {
        fn GetLastError() -> u32;
        fn SetLastError(code: u32);
    }

    /// Read the calling thread's last-error code
    #[cfg(windows)]
    #[inline]
    pub fn get() -> u32 {
        unsafe { GetLastError() }
    }

    /// Overwrite the calling thread's last-error code
    #[cfg(windows)]
    #[inline]
    pub fn set(code: u32) {
        unsafe { SetLastError(code) }
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))]
    #[inline]
    fn location() -> *mut libc::c_int {
        unsafe { libc::__errno_location() }
    }

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly"
    ))]
    #[inline]
    fn location() -> *mut libc::c_int {
        unsafe { libc::__error() }
    }

    #[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
    #[inline]
    fn location() -> *mut libc::c_int {
        unsafe { libc::__errno() }
    }

    /// Read the calling thread's last-error code
    #[cfg(unix)]
    #[inline]
    pub fn get() -> u32 {
        unsafe { *location() as u32 }
    }

    /// Overwrite the calling thread's last-error code
    #[cfg(unix)]
    #[inline]
    pub fn set(code: u32) {
        unsafe { *location() = code as libc::c_int }
    }
}
