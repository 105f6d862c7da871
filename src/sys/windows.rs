//! kernel32 bindings.

use crate::ffi::{Failure, Handle, LazyLibrary, LazyProc};
use crate::native_fn;

/// The Windows kernel library.
pub static KERNEL32: LazyLibrary = LazyLibrary::new("kernel32.dll");

static GET_CURRENT_PROCESS_ID: LazyProc = KERNEL32.proc("GetCurrentProcessId");
static GET_PROCESS_HEAP: LazyProc = KERNEL32.proc("GetProcessHeap");
static HEAP_ALLOC: LazyProc = KERNEL32.proc("HeapAlloc");
static HEAP_REALLOC: LazyProc = KERNEL32.proc("HeapReAlloc");
static HEAP_SIZE: LazyProc = KERNEL32.proc("HeapSize");
static HEAP_FREE: LazyProc = KERNEL32.proc("HeapFree");
static GLOBAL_ALLOC: LazyProc = KERNEL32.proc("GlobalAlloc");
static GLOBAL_LOCK: LazyProc = KERNEL32.proc("GlobalLock");
static GLOBAL_UNLOCK: LazyProc = KERNEL32.proc("GlobalUnlock");
static GLOBAL_FREE: LazyProc = KERNEL32.proc("GlobalFree");

/// `HEAP_ZERO_MEMORY`
pub const HEAP_ZERO_MEMORY: u32 = 0x0000_0008;
/// `GMEM_MOVEABLE`
pub const GMEM_MOVEABLE: u32 = 0x0002;
/// `GMEM_ZEROINIT`
pub const GMEM_ZEROINIT: u32 = 0x0040;

native_fn! {
    pub fn get_current_process_id() -> u32 = GET_CURRENT_PROCESS_ID, Failure::Never;

    /// Default heap of the calling process.
    pub fn get_process_heap() -> Handle = GET_PROCESS_HEAP, Failure::Zero;

    /// Allocate `bytes` from `heap`. The block belongs to the caller.
    pub unsafe fn heap_alloc(heap: Handle, flags: u32, bytes: usize) -> usize
        = HEAP_ALLOC, Failure::Zero;

    pub unsafe fn heap_realloc(heap: Handle, flags: u32, mem: usize, bytes: usize) -> usize
        = HEAP_REALLOC, Failure::Zero;

    /// Size of a heap block; `(SIZE_T)-1` on failure.
    pub unsafe fn heap_size(heap: Handle, flags: u32, mem: usize) -> usize
        = HEAP_SIZE, Failure::Sentinel(usize::MAX);

    pub unsafe fn heap_free(heap: Handle, flags: u32, mem: usize) -> bool
        = HEAP_FREE, Failure::Zero;

    pub fn global_alloc(flags: u32, bytes: usize) -> Handle = GLOBAL_ALLOC, Failure::Zero;

    pub unsafe fn global_lock(mem: Handle) -> usize = GLOBAL_LOCK, Failure::Zero;

    /// Remaining lock count. Zero means the block is now unlocked, so the
    /// result is not treated as a failure signal.
    pub unsafe fn global_unlock(mem: Handle) -> u32 = GLOBAL_UNLOCK, Failure::Never;

    /// Frees a global block. Returns a null handle on success.
    pub unsafe fn global_free(mem: Handle) -> Handle = GLOBAL_FREE, Failure::NonZero;
}
