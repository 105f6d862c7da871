//! Machine-Word Types
//!
//! Marshalling between typed Rust values and the single machine word every
//! native argument and return value travels in.

use std::fmt;
use std::ptr::NonNull;

/// A native machine word. Always the host pointer width.
pub type Word = usize;

/// Resolved address of an exported symbol.
///
/// Addresses come straight from the platform loader and are never
/// dereferenced by this crate; a null address is representable so that
/// invocation can reject it instead of jumping through it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Address(usize);

impl Address {
    /// The null address.
    pub const NULL: Address = Address(0);

    /// Wrap a raw address value
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check for the null address
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#0width$x}", self.0, width = 2 + 2 * std::mem::size_of::<usize>())
    }
}

impl<T> From<*const T> for Address {
    fn from(ptr: *const T) -> Self {
        Self(ptr as usize)
    }
}

/// Opaque native handle (module, heap, memory block, window, ...).
///
/// The core never owns what a handle refers to; releasing it is the
/// caller's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(pub usize);

impl Handle {
    /// `INVALID_HANDLE_VALUE` (all bits set)
    pub const INVALID: Handle = Handle(usize::MAX);

    /// Null or all-bits-set
    pub const fn is_invalid(self) -> bool {
        self.0 == 0 || self.0 == Self::INVALID.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Conversion of an argument into a machine word.
///
/// Narrower integers are widened (signed types sign-extend), wider ones
/// are truncated to the host width.
pub trait IntoWord {
    fn into_word(self) -> Word;
}

/// Conversion of a machine-word return value into a typed value.
///
/// Conversions to types narrower than a word keep only the low bits, since
/// the upper bits of the return register are unspecified for such returns.
pub trait FromWord: Sized {
    fn from_word(word: Word) -> Self;
}

macro_rules! word_integers {
    ($($ty:ty => $via:ty),* $(,)?) => {
        $(
            impl IntoWord for $ty {
                #[inline]
                fn into_word(self) -> Word {
                    self as $via as Word
                }
            }

            impl FromWord for $ty {
                #[inline]
                fn from_word(word: Word) -> Self {
                    word as $ty
                }
            }
        )*
    };
}

word_integers! {
    u8 => usize,
    u16 => usize,
    u32 => usize,
    u64 => usize,
    usize => usize,
    i8 => isize,
    i16 => isize,
    i32 => isize,
    i64 => isize,
    isize => isize,
}

impl IntoWord for bool {
    #[inline]
    fn into_word(self) -> Word {
        self as Word
    }
}

impl FromWord for bool {
    // BOOL is 32 bits wide.
    #[inline]
    fn from_word(word: Word) -> Self {
        word as u32 != 0
    }
}

impl FromWord for () {
    #[inline]
    fn from_word(_: Word) -> Self {}
}

impl<T> IntoWord for *const T {
    #[inline]
    fn into_word(self) -> Word {
        self as Word
    }
}

impl<T> IntoWord for *mut T {
    #[inline]
    fn into_word(self) -> Word {
        self as Word
    }
}

impl<T> FromWord for *mut T {
    #[inline]
    fn from_word(word: Word) -> Self {
        word as *mut T
    }
}

impl<T> FromWord for *const T {
    #[inline]
    fn from_word(word: Word) -> Self {
        word as *const T
    }
}

impl<T> IntoWord for Option<NonNull<T>> {
    #[inline]
    fn into_word(self) -> Word {
        self.map_or(0, |p| p.as_ptr() as Word)
    }
}

impl<T> FromWord for Option<NonNull<T>> {
    #[inline]
    fn from_word(word: Word) -> Self {
        NonNull::new(word as *mut T)
    }
}

impl IntoWord for Handle {
    #[inline]
    fn into_word(self) -> Word {
        self.0
    }
}

impl FromWord for Handle {
    #[inline]
    fn from_word(word: Word) -> Self {
        Handle(word)
    }
}

impl IntoWord for Address {
    #[inline]
    fn into_word(self) -> Word {
        self.0
    }
}

impl FromWord for Address {
    #[inline]
    fn from_word(word: Word) -> Self {
        Address(word)
    }
}

/// Parse an integer argument as typed on a command line.
///
/// Accepts decimal (optionally negative, sign-extended to a word) and
/// `0x`-prefixed hexadecimal.
pub fn parse_word(text: &str) -> Option<Word> {
    let text = text.trim();
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return usize::from_str_radix(hex, 16).ok();
    }
    if text.starts_with('-') {
        return text.parse::<isize>().ok().map(IntoWord::into_word);
    }
    text.parse::<usize>().ok()
}
