//! Native interface to the emf2svg conversion library
//!
//! # Architecture
//!
//! ```text
//! Dispatcher worker
//!       │
//!       ▼
//! ConversionInterface (trait)
//!       │
//!       ├── DynamicInterface ── libloading ── libemf2svg.{so,dylib,dll}
//!       │                                      femf2svg / femf2html
//!       └── StaticInterface  ── entry points linked at build time
//! ```
//!
//! The dynamic implementation opens the library once, records whichever entry
//! points resolved, and reports failure for the ones that did not.

mod interface;
mod loader;
mod types;

pub use interface::{ConversionInterface, StaticInterface};
pub use loader::{find_library, DynamicInterface, DynamicLibrary};
pub use types::{
    path_to_cstring, ConvertMultiFn, ConvertSingleFn, NativeOptions, RawGeneratorOptions,
    MULTI_SYMBOL, SINGLE_SYMBOL,
};
