//! Native ABI types
//!
//! C layout of the generator options and the two conversion entry points exported
//! by the native emf2svg library.

use std::ffi::{CString, NulError};
use std::os::raw::{c_char, c_int, c_uint};
use std::path::Path;
use std::ptr;

use crate::request::GeneratorOptions;

/// Symbol name of the single-file entry point
pub const SINGLE_SYMBOL: &str = "femf2svg";

/// Symbol name of the multi-page entry point
pub const MULTI_SYMBOL: &str = "femf2html";

/// `int femf2svg(const char *in, const char *out, generatorOptions *options)`
pub type ConvertSingleFn =
    unsafe extern "C" fn(*const c_char, *const c_char, *mut RawGeneratorOptions) -> c_int;

/// `int femf2html(int n, const char **in, const char *out, generatorOptions *options)`
pub type ConvertMultiFn = unsafe extern "C" fn(
    c_int,
    *mut *const c_char,
    *const c_char,
    *mut RawGeneratorOptions,
) -> c_int;

/// `generatorOptions` exactly as the native header lays it out
#[repr(C)]
#[derive(Debug)]
pub struct RawGeneratorOptions {
    pub name_space: *mut c_char,
    pub verbose: bool,
    pub emfplus: bool,
    pub svg_delimiter: bool,
    pub img_height: f64,
    pub img_width: f64,
    pub link_resources: bool,
    pub resource_path: *const c_char,
    pub page_width: c_uint,
    pub page_height: c_uint,
    pub page_landscape: bool,
    pub left_margin: c_uint,
    pub right_margin: c_uint,
    pub lower_margin: c_uint,
    pub upper_margin: c_uint,
}

/// Generator options marshalled for one native call.
///
/// Owns the C strings the raw struct points into, so it must outlive the call.
pub struct NativeOptions {
    _namespace: Option<CString>,
    _resource_path: Option<CString>,
    raw: RawGeneratorOptions,
}

impl NativeOptions {
    pub fn new(options: &GeneratorOptions) -> Result<Self, NulError> {
        let namespace = options
            .namespace
            .as_deref()
            .map(CString::new)
            .transpose()?;
        let resource_path = match (&options.resource_path, options.link_resources) {
            (Some(path), true) => Some(path_to_cstring(path)?),
            _ => None,
        };

        let raw = RawGeneratorOptions {
            // The native side never writes through the namespace pointer
            name_space: namespace
                .as_ref()
                .map_or(ptr::null_mut(), |s| s.as_ptr() as *mut c_char),
            verbose: options.verbose,
            emfplus: options.emfplus,
            svg_delimiter: options.svg_delimiter,
            img_height: options.image_height,
            img_width: options.image_width,
            link_resources: resource_path.is_some(),
            resource_path: resource_path.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            page_width: options.page.width,
            page_height: options.page.height,
            page_landscape: options.page.landscape,
            left_margin: options.page.left_margin,
            right_margin: options.page.right_margin,
            lower_margin: options.page.lower_margin,
            upper_margin: options.page.upper_margin,
        };

        Ok(Self {
            _namespace: namespace,
            _resource_path: resource_path,
            raw,
        })
    }

    pub fn raw(&self) -> &RawGeneratorOptions {
        &self.raw
    }

    pub fn as_mut_ptr(&mut self) -> *mut RawGeneratorOptions {
        &mut self.raw
    }
}

/// Convert a filesystem path to a C string without lossy re-encoding on Unix
pub fn path_to_cstring(path: &Path) -> Result<CString, NulError> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes())
    }

    #[cfg(not(unix))]
    {
        CString::new(path.to_string_lossy().into_owned())
    }
}
