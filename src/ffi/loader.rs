//! Dynamic Library Loader
//!
//! Opens the native emf2svg library at runtime and resolves its two conversion
//! entry points. Initialization happens at most once per [`DynamicInterface`];
//! failures are recorded, logged once, and turn every later call into a failure.

use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use log::{debug, error, info, warn};
use once_cell::sync::{Lazy, OnceCell};

use super::interface::{call_multi, call_single, ConversionInterface};
use super::types::{ConvertMultiFn, ConvertSingleFn, MULTI_SYMBOL, SINGLE_SYMBOL};
use crate::error::LoadError;
use crate::request::GeneratorOptions;

/// An opened native library. Never closed.
#[derive(Debug)]
pub struct DynamicLibrary {
    /// Path the library was opened from
    path: PathBuf,
    /// Kept open for the rest of the process: resolved entry points are plain
    /// function pointers into it.
    library: ManuallyDrop<Library>,
}

impl DynamicLibrary {
    /// Open a library with lazy, process-local symbol binding
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();

        let library = open_local(&path).map_err(|e| LoadError::Open {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            path,
            library: ManuallyDrop::new(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a function symbol and copy the pointer out of the library.
    ///
    /// # Safety
    ///
    /// `T` must be the exact function pointer type of the exported symbol.
    pub unsafe fn entry<T: Copy>(&self, name: &'static str) -> Result<T, LoadError> {
        let mut symbol = Vec::with_capacity(name.len() + 1);
        symbol.extend_from_slice(name.as_bytes());
        symbol.push(0);

        self.library
            .get::<T>(&symbol)
            .map(|s| *s)
            .map_err(|e| LoadError::Symbol {
                symbol: name,
                reason: e.to_string(),
            })
    }
}

#[cfg(unix)]
fn open_local(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LAZY, RTLD_LOCAL};

    // Safety: loading a library runs its initializers. The path comes from the
    // host, which is trusted to name a genuine emf2svg build.
    unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_local(path: &Path) -> Result<Library, libloading::Error> {
    // Safety: see the Unix variant.
    unsafe { Library::new(path) }
}

/// The resolved function table. Written once, read-only afterwards.
struct NativeTable {
    requested: PathBuf,
    library: Option<DynamicLibrary>,
    single: Option<ConvertSingleFn>,
    multi: Option<ConvertMultiFn>,
}

impl NativeTable {
    fn load(requested: &Path) -> Self {
        let mut table = NativeTable {
            requested: requested.to_path_buf(),
            library: None,
            single: None,
            multi: None,
        };

        let path = find_library(requested);
        let library = match DynamicLibrary::open(&path) {
            Ok(library) => library,
            Err(e) => {
                error!("{}", e);
                return table;
            }
        };

        // SAFETY: both symbol types match the prototypes in the native header.
        match unsafe { library.entry::<ConvertSingleFn>(SINGLE_SYMBOL) } {
            Ok(f) => table.single = Some(f),
            Err(e) => error!("{}", e),
        }
        match unsafe { library.entry::<ConvertMultiFn>(MULTI_SYMBOL) } {
            Ok(f) => table.multi = Some(f),
            Err(e) => error!("{}", e),
        }

        table.library = Some(library);
        table
    }

    fn is_complete(&self) -> bool {
        self.single.is_some() && self.multi.is_some()
    }
}

static SHARED: Lazy<Arc<DynamicInterface>> = Lazy::new(|| Arc::new(DynamicInterface::new()));

/// [`ConversionInterface`] backed by a runtime-loaded library
#[derive(Default)]
pub struct DynamicInterface {
    table: OnceCell<NativeTable>,
}

impl DynamicInterface {
    /// A fresh, unloaded interface
    pub fn new() -> Self {
        Self {
            table: OnceCell::new(),
        }
    }

    /// The process-wide instance; the library it loads stays active for every
    /// bridge sharing it.
    pub fn shared() -> Arc<DynamicInterface> {
        Arc::clone(&SHARED)
    }

    /// Path the library was actually opened from, if it opened
    pub fn library_path(&self) -> Option<&Path> {
        self.table
            .get()
            .and_then(|t| t.library.as_ref())
            .map(DynamicLibrary::path)
    }

    /// Whether `femf2svg` resolved
    pub fn has_single(&self) -> bool {
        self.table.get().map_or(false, |t| t.single.is_some())
    }

    /// Whether `femf2html` resolved
    pub fn has_multi(&self) -> bool {
        self.table.get().map_or(false, |t| t.multi.is_some())
    }
}

impl ConversionInterface for DynamicInterface {
    fn ensure_loaded(&self, library: &Path, verbose: bool) {
        let mut fresh = false;
        let table = self.table.get_or_init(|| {
            fresh = true;
            NativeTable::load(library)
        });

        if fresh {
            if verbose && table.is_complete() {
                info!("Loaded library '{}'", library.display());
            }
        } else if table.requested.as_path() != library {
            warn!(
                "ignoring library '{}': '{}' was already loaded",
                library.display(),
                table.requested.display()
            );
        }
    }

    fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }

    fn convert_single(
        &self,
        source: &Path,
        destination: &Path,
        options: &GeneratorOptions,
    ) -> bool {
        match self.table.get().and_then(|t| t.single) {
            Some(entry) => call_single(entry, source, destination, options),
            None => {
                debug!(
                    "{} unavailable, failing conversion of {}",
                    SINGLE_SYMBOL,
                    source.display()
                );
                false
            }
        }
    }

    fn convert_multi(
        &self,
        pages: &[PathBuf],
        destination: &Path,
        options: &GeneratorOptions,
    ) -> bool {
        match self.table.get().and_then(|t| t.multi) {
            Some(entry) => call_multi(entry, pages, destination, options),
            None => {
                debug!(
                    "{} unavailable, failing conversion to {}",
                    MULTI_SYMBOL,
                    destination.display()
                );
                false
            }
        }
    }
}

/// Locate a library given either a path or a bare name like `emf2svg`.
///
/// Existing paths and anything containing a directory component are returned
/// unchanged; bare names are looked up as platform library file names across the
/// default search paths. If nothing matches, the name is handed to the OS loader
/// as-is.
pub fn find_library(name: &Path) -> PathBuf {
    find_library_in(name, &default_search_paths())
}

/// [`find_library`] over an explicit list of directories
pub(crate) fn find_library_in(name: &Path, search: &[PathBuf]) -> PathBuf {
    if name.exists() || name.components().count() > 1 {
        return name.to_path_buf();
    }

    let lib_name = match name.to_str() {
        Some(s) => library_filename(s),
        None => return name.to_path_buf(),
    };

    search
        .iter()
        .map(|dir| dir.join(&lib_name))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| name.to_path_buf())
}

/// Get the default library search paths for this platform
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/lib"));
        paths.push(PathBuf::from("/lib64"));
        paths.push(PathBuf::from("/usr/lib64"));

        if let Ok(ld_path) = std::env::var("LD_LIBRARY_PATH") {
            paths.extend(ld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));

        if let Ok(dyld_path) = std::env::var("DYLD_LIBRARY_PATH") {
            paths.extend(dyld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = std::env::var("PATH") {
            paths.extend(path.split(';').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    paths
}

/// Construct the platform-specific library filename
pub(crate) fn library_filename(name: &str) -> String {
    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(target_os = "windows")]
    {
        if name.ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        if name.starts_with("lib") && name.contains(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }
}
