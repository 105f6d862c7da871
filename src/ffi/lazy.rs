//! Lazy Declarations
//!
//! `const`-constructible library and procedure declarations that bind to
//! [`Bindings::global`] on first use, and the [`native_fn!`] macro that
//! turns a declaration into a typed wrapper function.
//!
//! ```ignore
//! use procbind::{native_fn, Failure, LazyLibrary, LazyProc};
//!
//! static KERNEL32: LazyLibrary = LazyLibrary::new("kernel32.dll");
//! static GET_TICK_COUNT: LazyProc = KERNEL32.proc("GetTickCount");
//!
//! native_fn! {
//!     pub fn get_tick_count() -> u32 = GET_TICK_COUNT, Failure::Never;
//! }
//! ```
//!
//! [`native_fn!`]: crate::native_fn

use once_cell::sync::OnceCell;

use super::error::BindResult;
use super::library::LibraryHandle;
use super::registry::Bindings;
use super::trampoline::{self, CallResult, WordArgs};
use super::types::Address;

/// A library declared by name and loaded on first use.
pub struct LazyLibrary {
    name: &'static str,
    handle: OnceCell<LibraryHandle>,
}

impl LazyLibrary {
    /// Declare a library. Performs no loading.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: OnceCell::new(),
        }
    }

    /// Declared name
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declare a procedure exported by this library
    pub const fn proc(&'static self, symbol: &'static str) -> LazyProc {
        LazyProc::new(self, symbol)
    }

    /// The global registry's handle for this library
    pub fn handle(&self) -> &LibraryHandle {
        self.handle
            .get_or_init(|| Bindings::global().acquire_library(self.name))
    }

    /// Load now and report whether it worked
    pub fn load(&self) -> BindResult<()> {
        self.handle().check()
    }
}

/// A procedure declared by library and export name, resolved on first use.
///
/// Only a successful resolution is remembered; after a failure the next
/// use resolves again.
pub struct LazyProc {
    library: &'static LazyLibrary,
    symbol: &'static str,
    address: OnceCell<Address>,
}

impl LazyProc {
    /// Declare a procedure. Performs no loading or lookup.
    pub const fn new(library: &'static LazyLibrary, symbol: &'static str) -> Self {
        Self {
            library,
            symbol,
            address: OnceCell::new(),
        }
    }

    /// Export name
    pub const fn symbol(&self) -> &'static str {
        self.symbol
    }

    /// Owning library
    pub const fn library(&self) -> &'static LazyLibrary {
        self.library
    }

    /// Resolve now and report whether it worked
    pub fn find(&self) -> BindResult<()> {
        self.addr().map(|_| ())
    }

    /// Resolved address, resolving on first use
    pub fn addr(&self) -> BindResult<Address> {
        self.address
            .get_or_try_init(|| self.library.handle().resolve(self.symbol))
            .copied()
    }

    /// Call the procedure.
    ///
    /// # Safety
    ///
    /// The export must take exactly as many word-sized arguments as `args`
    /// holds, and the arguments must be valid for it.
    pub unsafe fn call<A: WordArgs>(&self, args: A) -> BindResult<CallResult> {
        let address = self.addr()?;
        trampoline::invoke(address, args)
    }
}

/// Generate typed wrapper functions over [`LazyProc`] declarations.
///
/// Each declaration names the wrapper, its parameters and return type, the
/// procedure to call, and the [`Failure`](crate::Failure) convention that
/// decides when the captured last error is translated. Declarations
/// prefixed with `unsafe` produce `unsafe fn`s; the others assert that the
/// call is sound for any argument values.
///
/// ```ignore
/// native_fn! {
///     /// Returns the calling process's identifier.
///     pub fn getpid() -> i32 = GETPID, Failure::Never;
///
///     pub unsafe fn heap_free(heap: Handle, flags: u32, mem: usize) -> bool
///         = HEAP_FREE, Failure::Zero;
/// }
/// ```
#[macro_export]
macro_rules! native_fn {
    () => {};
    (
        $(#[$meta:meta])*
        $vis:vis unsafe fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty
            = $proc:path, $failure:expr;
        $($rest:tt)*
    ) => {
        $(#[$meta])*
        #[allow(clippy::missing_safety_doc)]
        $vis unsafe fn $name($($arg: $ty),*) -> $crate::BindResult<$ret> {
            $proc.call(($($arg,)*))?.check::<$ret>($failure)
        }

        $crate::native_fn!($($rest)*);
    };
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty
            = $proc:path, $failure:expr;
        $($rest:tt)*
    ) => {
        $(#[$meta])*
        $vis fn $name($($arg: $ty),*) -> $crate::BindResult<$ret> {
            // Safety: declared sound for every argument value at the binding site.
            let result = unsafe { $proc.call(($($arg,)*)) }?;
            result.check::<$ret>($failure)
        }

        $crate::native_fn!($($rest)*);
    };
}
