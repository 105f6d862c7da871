//! Binding Core Tests
//!
//! Registry, symbol cache and trampolines exercised end to end over
//! in-process export tables.

use std::sync::Arc;

use super::*;

extern "system" fn answer() -> usize {
    42
}

extern "system" fn fail_pending() -> usize {
    last_error::set(ERROR_IO_PENDING_CODE);
    0
}

extern "system" fn add(a: usize, b: usize) -> usize {
    a.wrapping_add(b)
}

extern "system" fn sum9(
    a: usize,
    b: usize,
    c: usize,
    d: usize,
    e: usize,
    f: usize,
    g: usize,
    h: usize,
    i: usize,
) -> usize {
    a + b + c + d + e + f + g + h + i
}

fn native_loader() -> Arc<TableLoader> {
    Arc::new(TableLoader::new().library(
        "native.dll",
        &[
            ("Answer", answer as *const () as usize),
            ("FailPending", fail_pending as *const () as usize),
            ("Add", add as *const () as usize),
            ("Sum9", sum9 as *const () as usize),
            ("Unset", 0),
        ],
    ))
}

fn bindings() -> (Bindings, Arc<TableLoader>) {
    let loader = native_loader();
    (Bindings::with_loader(Arc::clone(&loader)), loader)
}

// =============================================================================
// Library Registry
// =============================================================================

#[test]
fn test_acquire_is_idempotent() {
    let (bindings, loader) = bindings();
    let first = bindings.acquire_library("native.dll");
    let second = bindings.acquire_library("native.dll");

    assert_eq!(first, second);
    assert!(first.is_valid());
    assert_eq!(first.name(), "native.dll");
    assert_eq!(loader.load_count("native.dll"), 1);
    assert_eq!(bindings.stats().libraries_loaded, 1);
}

#[test]
fn test_missing_library_yields_invalid_handle() {
    let (bindings, loader) = bindings();
    let missing = bindings.acquire_library("missing.dll");

    assert!(!missing.is_valid());
    assert!(missing.check().unwrap_err().is_unavailable());

    let err = bindings.resolve_symbol(&missing, "Answer").unwrap_err();
    assert!(matches!(err, BindError::LibraryNotFound { ref library, .. } if library == "missing.dll"));
    assert_eq!(loader.lookup_count("missing.dll", "Answer"), 0);

    // The failed load is remembered rather than retried.
    let again = bindings.acquire_library("missing.dll");
    assert_eq!(again, missing);
    assert_eq!(loader.load_count("missing.dll"), 1);
    assert_eq!(bindings.stats().load_failures, 1);
}

#[test]
fn test_loaded_libraries_sorted() {
    let (bindings, _) = bindings();
    assert!(bindings.loaded_libraries().is_empty());

    bindings.acquire_library("native.dll");
    bindings.acquire_library("absent.dll");
    assert_eq!(bindings.loaded_libraries(), vec!["absent.dll", "native.dll"]);
}

#[cfg(windows)]
#[test]
fn test_library_names_fold_case_on_windows() {
    let (bindings, loader) = bindings();
    let lower = bindings.acquire_library("native.dll");
    let upper = bindings.acquire_library("NATIVE.DLL");
    assert_eq!(lower, upper);
    assert_eq!(loader.load_count("native.dll"), 1);
}

#[cfg(not(windows))]
#[test]
fn test_library_names_keep_case_elsewhere() {
    let (bindings, _) = bindings();
    let lower = bindings.acquire_library("native.dll");
    let upper = bindings.acquire_library("NATIVE.DLL");
    assert_ne!(lower, upper);
    assert!(!upper.is_valid());
}

// =============================================================================
// Symbol Cache
// =============================================================================

#[test]
fn test_resolve_caches_success() {
    let (bindings, loader) = bindings();
    let lib = bindings.acquire_library("native.dll");

    let first = bindings.resolve_symbol(&lib, "Answer").unwrap();
    let second = bindings.resolve_symbol(&lib, "Answer").unwrap();
    assert_eq!(first, second);
    assert_eq!(first, Address::new(answer as *const () as usize));
    assert_eq!(loader.lookup_count("native.dll", "Answer"), 1);
    assert_eq!(bindings.stats().symbols_resolved, 1);
    assert_eq!(lib.resolved_symbols(), vec![("Answer".to_string(), first)]);
}

#[test]
fn test_failed_lookup_not_cached() {
    let (bindings, loader) = bindings();
    let lib = bindings.acquire_library("native.dll");

    for _ in 0..2 {
        let err = bindings.resolve_symbol(&lib, "Nope").unwrap_err();
        assert_eq!(
            err,
            BindError::SymbolNotFound {
                library: "native.dll".to_string(),
                symbol: "Nope".to_string(),
            }
        );
    }
    assert_eq!(loader.lookup_count("native.dll", "Nope"), 2);
    assert_eq!(bindings.stats().lookup_failures, 2);

    // Other exports are unaffected.
    assert!(bindings.resolve_symbol(&lib, "Answer").is_ok());
    assert!(lib.resolved_symbols().iter().all(|(name, _)| name != "Nope"));
}

#[test]
fn test_symbol_names_are_exact() {
    let (bindings, _) = bindings();
    let lib = bindings.acquire_library("native.dll");
    assert!(bindings.resolve_symbol(&lib, "answer").is_err());
    assert!(bindings.resolve_symbol(&lib, "Answer ").is_err());
    assert!(bindings.resolve_symbol(&lib, "Answer").is_ok());
}

#[test]
fn test_interior_nul_rejected() {
    let (bindings, loader) = bindings();
    let lib = bindings.acquire_library("native.dll");
    let err = bindings.resolve_symbol(&lib, "Ans\0wer").unwrap_err();
    assert_eq!(err, BindError::InvalidSymbolName("Ans\0wer".to_string()));
    assert_eq!(loader.lookup_count("native.dll", "Ans"), 0);
}

// =============================================================================
// Invocation
// =============================================================================

#[test]
fn test_zero_argument_success() {
    let (bindings, _) = bindings();
    let lib = bindings.acquire_library("native.dll");
    let addr = bindings.resolve_symbol(&lib, "Answer").unwrap();

    let result = unsafe { bindings.invoke(addr, ()) }.unwrap();
    assert_eq!(result.value, 42);
    assert_eq!(result.check::<u32>(Failure::Zero), Ok(42));
}

#[test]
fn test_nine_arguments() {
    let (bindings, _) = bindings();
    let lib = bindings.acquire_library("native.dll");
    let addr = bindings.resolve_symbol(&lib, "Sum9").unwrap();

    let result =
        unsafe { bindings.invoke(addr, (1u32, 2u32, 3u32, 4u32, 5u32, 6u32, 7u32, 8u32, 9u32)) }
            .unwrap();
    assert_eq!(result.value, 45);
}

#[test]
fn test_null_export_fails_before_calling() {
    let (bindings, _) = bindings();
    let lib = bindings.acquire_library("native.dll");
    let addr = bindings.resolve_symbol(&lib, "Unset").unwrap();
    assert!(addr.is_null());

    let err = unsafe { bindings.invoke(addr, (1u32,)) }.unwrap_err();
    assert_eq!(err, BindError::NullAddress);
}

#[test]
fn test_pending_error_translated_every_time() {
    let (bindings, _) = bindings();
    let lib = bindings.acquire_library("native.dll");
    let addr = bindings.resolve_symbol(&lib, "FailPending").unwrap();

    for _ in 0..2 {
        last_error::set(0);
        let result = unsafe { bindings.invoke(addr, ()) }.unwrap();
        assert_eq!(result.last_error, ERROR_IO_PENDING_CODE);
        let err = result.check::<Handle>(Failure::Zero).unwrap_err();
        assert_eq!(err.native(), Some(ERROR_IO_PENDING));
        assert!(err.native().is_some_and(|e| e.is_pending()));
    }
}

#[test]
fn test_success_skips_translation() {
    let (bindings, _) = bindings();
    let lib = bindings.acquire_library("native.dll");
    let addr = bindings.resolve_symbol(&lib, "Add").unwrap();

    // A stale code left by an earlier call must not leak into a success.
    last_error::set(5);
    let result = unsafe { bindings.invoke(addr, (40usize, 2usize)) }.unwrap();
    assert_eq!(result.check::<usize>(Failure::Zero), Ok(42));
}

// =============================================================================
// Error Translator
// =============================================================================

#[test]
fn test_translate_table() {
    assert_eq!(translate(0), ERROR_EINVAL);
    assert_eq!(translate(997), ERROR_IO_PENDING);
    assert_eq!(translate(5), NativeError::Code(5));
    assert_eq!(translate(u32::MAX).code(), Some(u32::MAX));
}
