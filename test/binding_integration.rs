//! Binding Integration Tests
//!
//! Drives the registry from many threads at once over an in-process
//! export table and checks that loading and resolution each happen once.

use std::sync::{Arc, Barrier};

use procbind::{
    last_error, native_fn, Address, BindError, Bindings, Failure, LazyLibrary, LazyProc,
    TableLoader, ERROR_IO_PENDING,
};

const THREADS: usize = 16;

extern "system" fn triple(x: usize) -> usize {
    x * 3
}

extern "system" fn always_pending() -> usize {
    last_error::set(997);
    0
}

fn loader() -> Arc<TableLoader> {
    Arc::new(TableLoader::new().library(
        "shared.dll",
        &[
            ("Triple", triple as *const () as usize),
            ("AlwaysPending", always_pending as *const () as usize),
        ],
    ))
}

#[test]
fn test_concurrent_acquire_loads_once() {
    let loader = loader();
    let bindings = Bindings::with_loader(Arc::clone(&loader));
    let barrier = Barrier::new(THREADS);

    let handles = crossbeam::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    bindings.acquire_library("shared.dll")
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .collect::<Vec<_>>()
    })
    .unwrap();

    assert!(handles.iter().all(|h| *h == handles[0]));
    assert_eq!(loader.load_count("shared.dll"), 1);
    assert_eq!(bindings.stats().libraries_loaded, 1);
}

#[test]
fn test_concurrent_resolve_looks_up_once() {
    let loader = loader();
    let bindings = Bindings::with_loader(Arc::clone(&loader));
    let lib = bindings.acquire_library("shared.dll");
    let barrier = Barrier::new(THREADS);

    let addrs = crossbeam::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|i| {
                let lib = &lib;
                let bindings = &bindings;
                let barrier = &barrier;
                s.spawn(move |_| {
                    barrier.wait();
                    let addr = bindings.resolve_symbol(lib, "Triple").unwrap();
                    let result = unsafe { bindings.invoke(addr, (i,)) }.unwrap();
                    assert_eq!(result.value, i * 3);
                    addr
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .collect::<Vec<Address>>()
    })
    .unwrap();

    assert!(addrs.iter().all(|a| *a == Address::new(triple as *const () as usize)));
    assert_eq!(loader.lookup_count("shared.dll", "Triple"), 1);
}

#[test]
fn test_concurrent_missing_library_stays_invalid() {
    let loader = loader();
    let bindings = Bindings::with_loader(Arc::clone(&loader));
    let barrier = Barrier::new(THREADS);

    crossbeam::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                let lib = bindings.acquire_library("absent.dll");
                let err = bindings.resolve_symbol(&lib, "Triple").unwrap_err();
                assert!(matches!(err, BindError::LibraryNotFound { .. }));
            });
        }
    })
    .unwrap();

    assert_eq!(loader.load_count("absent.dll"), 1);
    assert_eq!(loader.lookup_count("absent.dll", "Triple"), 0);
    assert_eq!(bindings.stats().load_failures, 1);
}

#[test]
fn test_last_error_is_per_thread() {
    let bindings = Bindings::with_loader(loader());
    let lib = bindings.acquire_library("shared.dll");
    let pending = bindings.resolve_symbol(&lib, "AlwaysPending").unwrap();
    let triple = bindings.resolve_symbol(&lib, "Triple").unwrap();

    crossbeam::scope(|s| {
        s.spawn(|_| {
            for _ in 0..100 {
                let result = unsafe { bindings.invoke(pending, ()) }.unwrap();
                let err = result.check::<usize>(Failure::Zero).unwrap_err();
                assert_eq!(err.native(), Some(ERROR_IO_PENDING));
            }
        });
        s.spawn(|_| {
            last_error::set(0);
            for i in 1..100usize {
                let result = unsafe { bindings.invoke(triple, (i,)) }.unwrap();
                assert_eq!(result.last_error, 0);
            }
        });
    })
    .unwrap();
}

// Global registry: every declaration below resolves through `Bindings::global()`,
// which this test binary installs over an export table before first use.

static SHARED: LazyLibrary = LazyLibrary::new("shared.dll");
static TRIPLE: LazyProc = SHARED.proc("Triple");
static ALWAYS_PENDING: LazyProc = SHARED.proc("AlwaysPending");
static MISSING: LazyProc = SHARED.proc("Missing");

native_fn! {
    fn shared_triple(x: u32) -> u32 = TRIPLE, Failure::Zero;
    fn shared_pending() -> usize = ALWAYS_PENDING, Failure::Zero;
    fn shared_missing() -> u32 = MISSING, Failure::Never;
}

#[test]
fn test_generated_wrappers() {
    let _ = Bindings::install(Bindings::with_loader(loader()));

    assert_eq!(shared_triple(14), Ok(42));
    assert!(shared_triple(0).unwrap_err().native().is_some());
    assert_eq!(shared_pending(), Err(BindError::Native(ERROR_IO_PENDING)));
    assert_eq!(shared_pending(), Err(BindError::Native(ERROR_IO_PENDING)));

    let err = shared_missing().unwrap_err();
    assert!(err.is_unavailable());
    assert!(MISSING.find().is_err());
    assert!(TRIPLE.find().is_ok());
    assert_eq!(TRIPLE.library().name(), "shared.dll");
}
