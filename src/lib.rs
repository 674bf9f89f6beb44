//! emf2svg-bridge - Asynchronous EMF conversion over a native library
//!
//! Converts Windows Enhanced Metafiles to SVG (one file) or HTML (several pages)
//! by calling the `femf2svg` / `femf2html` entry points of a dynamically loaded
//! libemf2svg. Conversions run on a pool of worker threads so the host thread
//! never blocks; results come back to the host as `(error, success)` callbacks.
//!
//! # Features
//!
//! - **Loosely-typed requests**: JSON options objects validated into typed requests
//! - **Load once**: the native library is opened at most once per process
//! - **Host-thread callbacks**: completion callbacks only ever run on the thread
//!   that owns the [`Bridge`]
//! - **Fault containment**: missing libraries, missing entry points, and panics all
//!   surface as ordinary conversion failures
//!
//! # Example
//!
//! ```no_run
//! use emf2svg_bridge::Bridge;
//! use serde_json::json;
//!
//! let bridge = Bridge::new().unwrap();
//! bridge
//!     .convert(
//!         &json!({
//!             "emffile": "drawing.emf",
//!             "svgfile": "drawing.svg",
//!             "library": "libemf2svg.so",
//!         }),
//!         |error, success| {
//!             println!("{:?} {}", error, success);
//!             Ok(())
//!         },
//!     )
//!     .unwrap();
//! bridge.run_until_idle();
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod ffi;
pub mod request;
pub mod runtime;

pub use bridge::Bridge;
pub use config::{BridgeConfig, ConfigError, ConfigResult, CONFIG_FILE};
pub use error::{ArgumentError, LoadError, ReportingError};
pub use ffi::{find_library, ConversionInterface, DynamicInterface, StaticInterface};
pub use request::{
    parse_request, ConversionRequest, GeneratorOptions, PageLayout, ParsedRequest, HTML_FAILURE,
    SVG_FAILURE,
};
pub use runtime::{CompletionCallback, Outcome, WorkId, WorkState};
