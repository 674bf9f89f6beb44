//! Conversion requests and generator options
//!
//! The typed form of what a host asks for. [`parse_request`] builds these from the
//! loosely-typed options object a host hands to [`Bridge::convert`](crate::Bridge::convert).

mod marshal;

pub use marshal::{parse_request, ParsedRequest};

use std::path::{Path, PathBuf};

use crate::error::ArgumentError;

/// Diagnostic recorded when the single-file entry point reports failure.
pub const SVG_FAILURE: &str = "EMF to SVG convert failed.";

/// Diagnostic recorded when the multi-page entry point reports failure.
pub const HTML_FAILURE: &str = "EMF to HTML convert failed.";

/// What to convert and where to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionRequest {
    /// One EMF file to one SVG file
    Single {
        source: PathBuf,
        destination: PathBuf,
    },
    /// Several EMF pages, in order, to one HTML document
    MultiPage {
        pages: Vec<PathBuf>,
        destination: PathBuf,
    },
}

impl ConversionRequest {
    pub fn single(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        ConversionRequest::Single {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Build a multi-page request. An empty page list is rejected.
    pub fn multi_page<I, P>(
        pages: I,
        destination: impl Into<PathBuf>,
    ) -> Result<Self, ArgumentError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let pages: Vec<PathBuf> = pages.into_iter().map(Into::into).collect();
        if pages.is_empty() {
            return Err(ArgumentError::NoPages);
        }
        Ok(ConversionRequest::MultiPage {
            pages,
            destination: destination.into(),
        })
    }

    pub fn destination(&self) -> &Path {
        match self {
            ConversionRequest::Single { destination, .. }
            | ConversionRequest::MultiPage { destination, .. } => destination,
        }
    }

    /// Number of source files (1 for a single-file request)
    pub fn page_count(&self) -> usize {
        match self {
            ConversionRequest::Single { .. } => 1,
            ConversionRequest::MultiPage { pages, .. } => pages.len(),
        }
    }

    pub fn is_multi_page(&self) -> bool {
        matches!(self, ConversionRequest::MultiPage { .. })
    }

    /// The fixed diagnostic for a failed conversion of this shape
    pub fn failure_message(&self) -> &'static str {
        match self {
            ConversionRequest::Single { .. } => SVG_FAILURE,
            ConversionRequest::MultiPage { .. } => HTML_FAILURE,
        }
    }
}

/// Options forwarded to the native generator.
///
/// Mirrors the native `generatorOptions` struct field for field; see
/// [`RawGeneratorOptions`](crate::ffi::RawGeneratorOptions) for the C layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    /// SVG namespace prefix placed before each element
    pub namespace: Option<String>,
    pub verbose: bool,
    /// Handle EMF+ records
    pub emfplus: bool,
    /// Emit the SVG document delimiter
    pub svg_delimiter: bool,
    pub image_height: f64,
    pub image_width: f64,
    /// Store embedded images (and HTML pages) on disk instead of inline
    pub link_resources: bool,
    /// Where linked resources are written; present iff `link_resources`
    pub resource_path: Option<PathBuf>,
    pub page: PageLayout,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            verbose: false,
            emfplus: false,
            svg_delimiter: true,
            image_height: 0.0,
            image_width: 0.0,
            link_resources: false,
            resource_path: None,
            page: PageLayout::default(),
        }
    }
}

/// HTML print page layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageLayout {
    pub width: u32,
    pub height: u32,
    pub landscape: bool,
    pub left_margin: u32,
    pub right_margin: u32,
    pub lower_margin: u32,
    pub upper_margin: u32,
}
