//! Error types for the conversion bridge
//!
//! Only [`ArgumentError`] is ever returned to the caller of
//! [`Bridge::convert`](crate::Bridge::convert). Everything that happens after a
//! request has been queued is reported through the completion callback or the log.

use std::path::PathBuf;
use thiserror::Error;

/// A malformed or missing request field. Raised before any work is queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("options must be an object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("field '{field}' must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("element {index} of 'emffile' must be a string")]
    PageNotString { index: usize },

    #[error("No pages in emffile array")]
    NoPages,

    #[error("field '{0}' contains a NUL byte")]
    InteriorNul(&'static str),

    #[error("library name was not specified in call")]
    LibraryNotSpecified,
}

/// The native library or one of its entry points is unavailable.
///
/// Never propagated: the loader records it and every later call into the
/// missing capability reports a conversion failure.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("Unable to load library '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Unable to load symbol '{symbol}': {reason}")]
    Symbol { symbol: &'static str, reason: String },
}

/// The host's completion callback failed while being invoked.
#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("completion callback for work item {id} returned an error: {source}")]
    Callback {
        id: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("completion callback for work item {id} panicked: {message}")]
    Panicked { id: u64, message: String },

    #[error("no completion callback registered for work item {0}")]
    Unregistered(u64),
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_error_display() {
        assert_eq!(ArgumentError::NoPages.to_string(), "No pages in emffile array");
        let err = ArgumentError::WrongType {
            field: "svgfile",
            expected: "string",
        };
        assert_eq!(err.to_string(), "field 'svgfile' must be a string");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
