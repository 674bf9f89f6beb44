//! Argument marshalling
//!
//! Turns the host's options object into a [`ConversionRequest`] plus
//! [`GeneratorOptions`]. Runs synchronously on the caller's thread.

use std::path::PathBuf;

use log::debug;
use serde_json::{Map, Value};

use super::{ConversionRequest, GeneratorOptions, PageLayout};
use crate::error::ArgumentError;

/// A validated request, ready to become a work item
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub request: ConversionRequest,
    pub options: GeneratorOptions,
    /// Native library path, if the caller supplied one
    pub library: Option<PathBuf>,
}

/// Parse a host options object.
///
/// `library_required` is true while no native library has been recorded for the
/// bridge; a missing `library` field is then an error. Otherwise the field is
/// passed through untouched and the caller decides whether to ignore it.
pub fn parse_request(
    options: &Value,
    library_required: bool,
) -> Result<ParsedRequest, ArgumentError> {
    let obj = options.as_object().ok_or(ArgumentError::NotAnObject)?;

    let request = match obj.get("emffile") {
        None | Some(Value::Null) => return Err(ArgumentError::Missing("emffile")),
        Some(Value::Array(items)) => {
            let mut pages = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let page = item
                    .as_str()
                    .ok_or(ArgumentError::PageNotString { index })?;
                check_nul(page, "emffile")?;
                pages.push(PathBuf::from(page));
            }
            if pages.is_empty() {
                return Err(ArgumentError::NoPages);
            }
            let destination = required_string(obj, "htmlfile")?;
            ConversionRequest::multi_page(pages, destination)?
        }
        Some(Value::String(source)) => {
            check_nul(source, "emffile")?;
            let destination = required_string(obj, "svgfile")?;
            ConversionRequest::single(source.as_str(), destination)
        }
        Some(_) => {
            return Err(ArgumentError::WrongType {
                field: "emffile",
                expected: "string or array of strings",
            })
        }
    };

    let options = parse_options(obj)?;

    let library = match obj.get("library") {
        Some(Value::String(path)) if path.is_empty() => {
            debug!("ignoring empty 'library' option");
            None
        }
        Some(Value::String(path)) => {
            check_nul(path, "library")?;
            Some(PathBuf::from(path))
        }
        Some(other) => {
            debug!("ignoring non-string 'library' option: {}", other);
            None
        }
        None => None,
    };
    if library_required && library.is_none() {
        return Err(ArgumentError::LibraryNotSpecified);
    }

    Ok(ParsedRequest {
        request,
        options,
        library,
    })
}

fn parse_options(obj: &Map<String, Value>) -> Result<GeneratorOptions, ArgumentError> {
    let mut options = GeneratorOptions {
        verbose: flag(obj, "verbose", false),
        emfplus: flag(obj, "emfplus", false),
        svg_delimiter: flag(obj, "svgdelimiter", true),
        link_resources: flag(obj, "linkresources", false),
        image_height: number(obj, "imgheight"),
        image_width: number(obj, "imgwidth"),
        page: PageLayout {
            width: unsigned(obj, "pagewidth"),
            height: unsigned(obj, "pageheight"),
            landscape: flag(obj, "landscape", false),
            left_margin: unsigned(obj, "leftmargin"),
            right_margin: unsigned(obj, "rightmargin"),
            lower_margin: unsigned(obj, "lowermargin"),
            upper_margin: unsigned(obj, "uppermargin"),
        },
        ..GeneratorOptions::default()
    };

    if let Some(ns) = obj.get("namespace").and_then(Value::as_str) {
        check_nul(ns, "namespace")?;
        options.namespace = Some(ns.to_string());
    }

    if options.link_resources {
        match obj.get("resourcepath").and_then(Value::as_str) {
            Some(path) => {
                check_nul(path, "resourcepath")?;
                options.resource_path = Some(PathBuf::from(path));
            }
            // Linking without a target directory is silently turned off
            None => options.link_resources = false,
        }
    }

    Ok(options)
}

fn required_string<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ArgumentError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ArgumentError::Missing(field)),
        Some(Value::String(s)) => {
            check_nul(s, field)?;
            Ok(s)
        }
        Some(_) => Err(ArgumentError::WrongType {
            field,
            expected: "string",
        }),
    }
}

fn flag(obj: &Map<String, Value>, field: &str, default: bool) -> bool {
    obj.get(field).and_then(Value::as_bool).unwrap_or(default)
}

fn number(obj: &Map<String, Value>, field: &str) -> f64 {
    obj.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn unsigned(obj: &Map<String, Value>, field: &str) -> u32 {
    obj.get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn check_nul(value: &str, field: &'static str) -> Result<(), ArgumentError> {
    if value.contains('\0') {
        Err(ArgumentError::InteriorNul(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_file_request() {
        let parsed = parse_request(
            &json!({
                "emffile": "a.emf",
                "svgfile": "a.svg",
                "verbose": false,
                "library": "libemf2svg.so",
            }),
            true,
        )
        .unwrap();
        assert_eq!(parsed.request, ConversionRequest::single("a.emf", "a.svg"));
        assert_eq!(parsed.library, Some(PathBuf::from("libemf2svg.so")));
        assert!(!parsed.options.verbose);
        assert!(parsed.options.svg_delimiter);
    }

    #[test]
    fn test_multi_page_request_keeps_order() {
        let parsed = parse_request(
            &json!({"emffile": ["p1.emf", "p2.emf", "p3.emf"], "htmlfile": "out.html"}),
            false,
        )
        .unwrap();
        match parsed.request {
            ConversionRequest::MultiPage { pages, destination } => {
                assert_eq!(
                    pages,
                    vec![
                        PathBuf::from("p1.emf"),
                        PathBuf::from("p2.emf"),
                        PathBuf::from("p3.emf")
                    ]
                );
                assert_eq!(destination, PathBuf::from("out.html"));
            }
            other => panic!("expected multi-page request, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_page_list_rejected() {
        let err =
            parse_request(&json!({"emffile": [], "htmlfile": "out.html"}), false).unwrap_err();
        assert_eq!(err, ArgumentError::NoPages);
    }

    #[test]
    fn test_non_string_page_rejected() {
        let err = parse_request(&json!({"emffile": ["p1.emf", 3], "htmlfile": "out.html"}), false)
            .unwrap_err();
        assert_eq!(err, ArgumentError::PageNotString { index: 1 });
    }

    #[test]
    fn test_destination_depends_on_mode() {
        // An array source reads htmlfile, not svgfile
        let err = parse_request(&json!({"emffile": ["p1.emf"], "svgfile": "out.svg"}), false)
            .unwrap_err();
        assert_eq!(err, ArgumentError::Missing("htmlfile"));

        let err =
            parse_request(&json!({"emffile": "a.emf", "htmlfile": "a.html"}), false).unwrap_err();
        assert_eq!(err, ArgumentError::Missing("svgfile"));

        let err = parse_request(&json!({"emffile": "a.emf", "svgfile": 12}), false).unwrap_err();
        assert_eq!(
            err,
            ArgumentError::WrongType {
                field: "svgfile",
                expected: "string"
            }
        );
    }

    #[test]
    fn test_bad_source_field() {
        assert_eq!(
            parse_request(&json!({"svgfile": "a.svg"}), false).unwrap_err(),
            ArgumentError::Missing("emffile")
        );
        assert!(matches!(
            parse_request(&json!({"emffile": true, "svgfile": "a.svg"}), false).unwrap_err(),
            ArgumentError::WrongType { field: "emffile", .. }
        ));
        assert_eq!(
            parse_request(&json!("a.emf"), false).unwrap_err(),
            ArgumentError::NotAnObject
        );
    }

    #[test]
    fn test_boolean_defaults_on_wrong_type() {
        let parsed = parse_request(
            &json!({"emffile": "a.emf", "svgfile": "a.svg", "verbose": "yes", "emfplus": 1}),
            false,
        )
        .unwrap();
        assert!(!parsed.options.verbose);
        assert!(!parsed.options.emfplus);

        let parsed = parse_request(
            &json!({"emffile": "a.emf", "svgfile": "a.svg", "verbose": true, "emfplus": true}),
            false,
        )
        .unwrap();
        assert!(parsed.options.verbose);
        assert!(parsed.options.emfplus);
    }

    #[test]
    fn test_link_resources_downgraded_without_path() {
        let parsed = parse_request(
            &json!({"emffile": "a.emf", "svgfile": "a.svg", "linkresources": true}),
            false,
        )
        .unwrap();
        assert!(!parsed.options.link_resources);
        assert!(parsed.options.resource_path.is_none());

        let parsed = parse_request(
            &json!({
                "emffile": "a.emf",
                "svgfile": "a.svg",
                "linkresources": true,
                "resourcepath": "res",
            }),
            false,
        )
        .unwrap();
        assert!(parsed.options.link_resources);
        assert_eq!(parsed.options.resource_path, Some(PathBuf::from("res")));
    }

    #[test]
    fn test_resource_path_ignored_without_link_flag() {
        let parsed = parse_request(
            &json!({"emffile": "a.emf", "svgfile": "a.svg", "resourcepath": "res"}),
            false,
        )
        .unwrap();
        assert!(!parsed.options.link_resources);
        assert!(parsed.options.resource_path.is_none());
    }

    #[test]
    fn test_library_required_on_first_call() {
        let err =
            parse_request(&json!({"emffile": "a.emf", "svgfile": "a.svg"}), true).unwrap_err();
        assert_eq!(err, ArgumentError::LibraryNotSpecified);

        // Once a library is known, a missing or malformed field is fine
        let options = json!({"emffile": "a.emf", "svgfile": "a.svg", "library": 5});
        let parsed = parse_request(&options, false).unwrap();
        assert!(parsed.library.is_none());
    }

    #[test]
    fn test_empty_library_counts_as_missing() {
        let options = json!({"emffile": "a.emf", "svgfile": "a.svg", "library": ""});
        assert_eq!(
            parse_request(&options, true).unwrap_err(),
            ArgumentError::LibraryNotSpecified
        );
        assert!(parse_request(&options, false).unwrap().library.is_none());
    }

    #[test]
    fn test_layout_fields() {
        let parsed = parse_request(
            &json!({
                "emffile": ["p1.emf"],
                "htmlfile": "out.html",
                "namespace": "svg",
                "imgwidth": 640.5,
                "imgheight": 480,
                "pagewidth": 210,
                "pageheight": 297,
                "landscape": true,
                "leftmargin": 10,
                "rightmargin": 11,
                "lowermargin": 12,
                "uppermargin": -4,
                "svgdelimiter": false
            }),
            false,
        )
        .unwrap();
        let options = parsed.options;
        assert_eq!(options.namespace.as_deref(), Some("svg"));
        assert_eq!(options.image_width, 640.5);
        assert_eq!(options.image_height, 480.0);
        assert!(!options.svg_delimiter);
        assert_eq!(
            options.page,
            PageLayout {
                width: 210,
                height: 297,
                landscape: true,
                left_margin: 10,
                right_margin: 11,
                lower_margin: 12,
                upper_margin: 0,
            }
        );
    }

    #[test]
    fn test_nul_bytes_rejected() {
        let options = json!({"emffile": "a\u{0}.emf", "svgfile": "a.svg"});
        let err = parse_request(&options, false).unwrap_err();
        assert_eq!(err, ArgumentError::InteriorNul("emffile"));
    }
}
