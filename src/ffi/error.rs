//! Error Translation
//!
//! Native last-error codes become [`NativeError`] values; everything the
//! binding layer can fail with is a [`BindError`].

use std::io;

use thiserror::Error;

/// Native code for "overlapped I/O operation is in progress".
pub const ERROR_IO_PENDING_CODE: u32 = 997;

/// A translated native last-error code.
///
/// The two hot cases are unit variants, so the shared constants
/// [`ERROR_EINVAL`] and [`ERROR_IO_PENDING`] are the only instances ever
/// handed out for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum NativeError {
    /// A failing call left no error code behind.
    #[error("invalid argument")]
    InvalidArgument,
    /// The operation was accepted but has not completed.
    #[error("overlapped I/O operation is in progress")]
    Pending,
    /// Any other code, carried verbatim.
    #[error("native error {0}: {}", os_message(.0))]
    Code(u32),
}

/// Shared sentinel for a failure that recorded no code.
pub const ERROR_EINVAL: NativeError = NativeError::InvalidArgument;

/// Shared sentinel for the pending condition.
pub const ERROR_IO_PENDING: NativeError = NativeError::Pending;

impl NativeError {
    /// Translate a captured last-error code.
    ///
    /// Only meaningful on a path the caller already decided has failed: a
    /// code of zero there means nothing was recorded, which is reported as
    /// [`ERROR_EINVAL`] rather than success.
    #[inline]
    pub const fn translate(code: u32) -> NativeError {
        match code {
            0 => ERROR_EINVAL,
            ERROR_IO_PENDING_CODE => ERROR_IO_PENDING,
            code => NativeError::Code(code),
        }
    }

    /// Numeric code, if one was recorded
    pub const fn code(&self) -> Option<u32> {
        match self {
            NativeError::InvalidArgument => None,
            NativeError::Pending => Some(ERROR_IO_PENDING_CODE),
            NativeError::Code(code) => Some(*code),
        }
    }

    /// Whether callers should poll instead of failing
    pub const fn is_pending(&self) -> bool {
        matches!(self, NativeError::Pending)
    }
}

/// Translate a captured last-error code. See [`NativeError::translate`].
#[inline]
pub const fn translate(code: u32) -> NativeError {
    NativeError::translate(code)
}

fn os_message(code: &u32) -> String {
    io::Error::from_raw_os_error(*code as i32).to_string()
}

impl From<NativeError> for io::Error {
    fn from(err: NativeError) -> Self {
        match err.code() {
            Some(code) => io::Error::from_raw_os_error(code as i32),
            None => io::Error::new(io::ErrorKind::InvalidInput, err),
        }
    }
}

/// Errors produced by the binding layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The platform loader could not locate or load the library
    #[error("library not found: {library}: {reason}")]
    LibraryNotFound { library: String, reason: String },

    /// The library is loaded but does not export the symbol
    #[error("symbol not found: {symbol} in {library}")]
    SymbolNotFound { library: String, symbol: String },

    /// The symbol name cannot be passed to the loader
    #[error("invalid symbol name: {0:?}")]
    InvalidSymbolName(String),

    /// Invocation was attempted through a null address
    #[error("call through a null address")]
    NullAddress,

    /// More arguments than any trampoline accepts
    #[error("too many arguments: {got} (max {max})")]
    TooManyArguments { got: usize, max: usize },

    /// The native call reported failure
    #[error(transparent)]
    Native(#[from] NativeError),
}

impl BindError {
    /// Whether this is a resolution failure (the feature is unavailable
    /// rather than broken).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            BindError::LibraryNotFound { .. } | BindError::SymbolNotFound { .. }
        )
    }

    /// The translated native error, if the call itself failed
    pub fn native(&self) -> Option<NativeError> {
        match self {
            BindError::Native(err) => Some(*err),
            _ => None,
        }
    }
}

/// Result type for binding operations.
pub type BindResult<T> = Result<T, BindError>;
