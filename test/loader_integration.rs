//! Loader Integration Tests
//!
//! Exercises the dynamic loader through the public API against libraries that
//! exist on every Linux host but lack the conversion entry points.

use emf2svg_bridge::ffi::{DynamicLibrary, MULTI_SYMBOL, SINGLE_SYMBOL};
use emf2svg_bridge::{
    Bridge, ConversionInterface, DynamicInterface, GeneratorOptions, LoadError, SVG_FAILURE,
};
use serde_json::json;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(target_os = "linux")]
const SYSTEM_LIB: &str = "libc.so.6";

#[test]
fn test_open_missing_library() {
    let err = DynamicLibrary::open("/nonexistent/libemf2svg.so").unwrap_err();
    match err {
        LoadError::Open { path, .. } => {
            assert_eq!(path, PathBuf::from("/nonexistent/libemf2svg.so"))
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[cfg(target_os = "linux")]
#[test]
fn test_system_library_lacks_entry_points() {
    let library = DynamicLibrary::open(SYSTEM_LIB).unwrap();
    assert_eq!(library.path(), Path::new(SYSTEM_LIB));

    for symbol in [SINGLE_SYMBOL, MULTI_SYMBOL] {
        let result = unsafe { library.entry::<unsafe extern "C" fn()>(symbol) };
        assert!(matches!(result, Err(LoadError::Symbol { .. })));
    }
}

#[cfg(target_os = "linux")]
#[test]
fn test_concurrent_first_load_initializes_once() {
    let interface = Arc::new(DynamicInterface::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let interface = Arc::clone(&interface);
            thread::spawn(move || {
                // Odd threads ask for a different library; only one request wins
                let library = if i % 2 == 0 {
                    SYSTEM_LIB
                } else {
                    "/nonexistent/other.so"
                };
                interface.ensure_loaded(Path::new(library), false);
                let options = GeneratorOptions::default();
                interface.convert_single(Path::new("a.emf"), Path::new("a.svg"), &options)
            })
        })
        .collect();

    for handle in handles {
        assert!(!handle.join().unwrap());
    }
    assert!(interface.is_loaded());
    let winner = interface.library_path().map(Path::to_path_buf);

    interface.ensure_loaded(Path::new("/nonexistent/third.so"), true);
    assert_eq!(interface.library_path().map(Path::to_path_buf), winner);
    assert!(!interface.has_single());
    assert!(!interface.has_multi());
}

#[cfg(target_os = "linux")]
#[test]
fn test_bridge_over_library_without_entry_points() {
    let bridge = Bridge::with_interface(Arc::new(DynamicInterface::new())).unwrap();
    let results = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..3 {
        let results = Rc::clone(&results);
        bridge
            .convert(
                &json!({
                    "emffile": "a.emf",
                    "svgfile": "a.svg",
                    "library": SYSTEM_LIB,
                    "verbose": true,
                }),
                move |message, success| {
                    results.borrow_mut().push((message, success));
                    Ok(())
                },
            )
            .unwrap();
    }
    assert!(bridge.run_until_idle_timeout(Duration::from_secs(10)));
    assert_eq!(*results.borrow(), vec![(Some(SVG_FAILURE.to_string()), false); 3]);
}
