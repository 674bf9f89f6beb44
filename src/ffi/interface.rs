//! The conversion interface seen by the dispatcher
//!
//! Implementations decide where the two entry points come from. The dispatcher
//! and the bridge only ever talk to this trait.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};

use log::{debug, error};

use super::types::{path_to_cstring, ConvertMultiFn, ConvertSingleFn, NativeOptions};
use crate::request::GeneratorOptions;

/// A source of the native conversion entry points.
///
/// Both conversion methods return `true` on success. An unavailable entry point is
/// a failure, never a panic.
pub trait ConversionInterface: Send + Sync {
    /// Make the entry points available. Idempotent: only the first call has any
    /// effect.
    fn ensure_loaded(&self, library: &Path, verbose: bool);

    /// Whether initialization has happened (successfully or not)
    fn is_loaded(&self) -> bool;

    fn convert_single(
        &self,
        source: &Path,
        destination: &Path,
        options: &GeneratorOptions,
    ) -> bool;

    /// `pages` are passed to the native side in the given order
    fn convert_multi(
        &self,
        pages: &[PathBuf],
        destination: &Path,
        options: &GeneratorOptions,
    ) -> bool;
}

/// Entry points linked into the process at build time.
///
/// Always loaded; [`ensure_loaded`](ConversionInterface::ensure_loaded) is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct StaticInterface {
    single: ConvertSingleFn,
    multi: ConvertMultiFn,
}

impl StaticInterface {
    pub fn new(single: ConvertSingleFn, multi: ConvertMultiFn) -> Self {
        Self { single, multi }
    }
}

impl ConversionInterface for StaticInterface {
    fn ensure_loaded(&self, _library: &Path, _verbose: bool) {}

    fn is_loaded(&self) -> bool {
        true
    }

    fn convert_single(
        &self,
        source: &Path,
        destination: &Path,
        options: &GeneratorOptions,
    ) -> bool {
        call_single(self.single, source, destination, options)
    }

    fn convert_multi(
        &self,
        pages: &[PathBuf],
        destination: &Path,
        options: &GeneratorOptions,
    ) -> bool {
        call_multi(self.multi, pages, destination, options)
    }
}

/// Marshal arguments and call a `femf2svg`-shaped entry point
pub(crate) fn call_single(
    entry: ConvertSingleFn,
    source: &Path,
    destination: &Path,
    options: &GeneratorOptions,
) -> bool {
    let (source, destination, mut native) = match (
        path_to_cstring(source),
        path_to_cstring(destination),
        NativeOptions::new(options),
    ) {
        (Ok(s), Ok(d), Ok(o)) => (s, d, o),
        _ => {
            error!("cannot pass arguments containing NUL bytes to the native library");
            return false;
        }
    };

    // SAFETY: the entry point has the femf2svg signature; every pointer refers to
    // memory owned by this frame and valid for the duration of the call.
    let status = unsafe { entry(source.as_ptr(), destination.as_ptr(), native.as_mut_ptr()) };
    debug!("femf2svg returned {}", status);
    status != 0
}

/// Marshal arguments and call a `femf2html`-shaped entry point
pub(crate) fn call_multi(
    entry: ConvertMultiFn,
    pages: &[PathBuf],
    destination: &Path,
    options: &GeneratorOptions,
) -> bool {
    let count = match c_int::try_from(pages.len()) {
        Ok(n) => n,
        Err(_) => {
            error!("too many pages for the native library: {}", pages.len());
            return false;
        }
    };
    let pages: Vec<CString> = match pages
        .iter()
        .map(|p| path_to_cstring(p))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(pages) => pages,
        Err(_) => {
            error!("cannot pass page paths containing NUL bytes to the native library");
            return false;
        }
    };
    let marshalled = (path_to_cstring(destination), NativeOptions::new(options));
    let (destination, mut native) = match marshalled {
        (Ok(d), Ok(o)) => (d, o),
        _ => {
            error!("cannot pass arguments containing NUL bytes to the native library");
            return false;
        }
    };
    let mut page_ptrs: Vec<*const c_char> = pages.iter().map(|p| p.as_ptr()).collect();

    // SAFETY: the entry point has the femf2html signature; `page_ptrs` holds
    // `count` valid C strings kept alive by `pages` until the call returns.
    let status = unsafe {
        entry(
            count,
            page_ptrs.as_mut_ptr(),
            destination.as_ptr(),
            native.as_mut_ptr(),
        )
    };
    debug!("femf2html returned {} for {} page(s)", status, count);
    status != 0
}
