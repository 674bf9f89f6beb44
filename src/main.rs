//! emf2svg-conv - Convert EMF files to SVG or HTML
//!
//! One input produces an SVG file; several inputs are converted as the pages of a
//! single HTML document.

use anyhow::{bail, Context, Result};
use clap::Parser;
use emf2svg_bridge::{Bridge, BridgeConfig, DynamicInterface};
use log::{error, info, LevelFilter};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "emf2svg-conv")]
#[command(version)]
#[command(about = "Convert Enhanced Metafiles to SVG or HTML", long_about = None)]
struct Cli {
    /// Input EMF file(s); more than one produces a multi-page HTML document
    #[arg(required = true, value_name = "EMF")]
    inputs: Vec<PathBuf>,

    /// Output file (default: input with .svg extension, or out.html)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Native library path or bare name (e.g. emf2svg)
    #[arg(long)]
    library: Option<PathBuf>,

    /// Verbose native output
    #[arg(short, long)]
    verbose: bool,

    /// Handle EMF+ records
    #[arg(long)]
    emfplus: bool,

    /// Reference embedded images instead of inlining them
    #[arg(long)]
    link_resources: bool,

    /// Directory for linked resources
    #[arg(long, requires = "link_resources")]
    resource_path: Option<PathBuf>,

    /// Configuration file (default: search for emf2svg.toml upward from cwd)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BridgeConfig::load_from_cwd().context("Failed to load config")?,
    };
    setup_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));

    let options = build_options(&cli)?;
    let bridge = Bridge::with_config(&config, DynamicInterface::shared())
        .context("Failed to start conversion workers")?;

    let outcome: Rc<RefCell<Option<(Option<String>, bool)>>> = Rc::default();
    let slot = Rc::clone(&outcome);
    bridge.convert(&options, move |message, success| {
        *slot.borrow_mut() = Some((message, success));
        Ok(())
    })?;
    bridge.run_until_idle();

    let destination = options["svgfile"]
        .as_str()
        .or_else(|| options["htmlfile"].as_str())
        .unwrap_or_default();
    let result = outcome.borrow_mut().take();
    match result {
        Some((_, true)) => {
            info!("Wrote {}", destination);
            Ok(())
        }
        Some((message, false)) => {
            let message = message.unwrap_or_else(|| "conversion failed".to_string());
            error!("{}", message);
            bail!("{} ({})", message, destination)
        }
        None => bail!("conversion was never reported"),
    }
}

fn setup_logging(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    // RUST_LOG still wins when set
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .init();
}

/// Options object in the shape the bridge accepts from any host
fn build_options(cli: &Cli) -> Result<Value> {
    let mut obj = Map::new();

    if let [input] = cli.inputs.as_slice() {
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| input.with_extension("svg"));
        obj.insert("emffile".into(), json!(path_str(input)?));
        obj.insert("svgfile".into(), json!(path_str(&output)?));
    } else {
        let pages = cli
            .inputs
            .iter()
            .map(|p| path_str(p))
            .collect::<Result<Vec<_>>>()?;
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from("out.html"));
        obj.insert("emffile".into(), json!(pages));
        obj.insert("htmlfile".into(), json!(path_str(&output)?));
    }

    obj.insert("verbose".into(), json!(cli.verbose));
    obj.insert("emfplus".into(), json!(cli.emfplus));
    obj.insert("linkresources".into(), json!(cli.link_resources));
    if let Some(dir) = &cli.resource_path {
        obj.insert("resourcepath".into(), json!(path_str(dir)?));
    }
    if let Some(library) = &cli.library {
        obj.insert("library".into(), json!(path_str(library)?));
    }

    Ok(Value::Object(obj))
}

fn path_str(path: &Path) -> Result<&str> {
    match path.to_str() {
        Some(s) => Ok(s),
        None => bail!("Path is not valid UTF-8: {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_input_defaults_to_svg() {
        let cli = Cli::parse_from(["emf2svg-conv", "drawing.emf", "--library", "emf2svg"]);
        let options = build_options(&cli).unwrap();
        assert_eq!(options["emffile"], "drawing.emf");
        assert_eq!(options["svgfile"], "drawing.svg");
        assert_eq!(options["library"], "emf2svg");
        assert_eq!(options["verbose"], false);
    }

    #[test]
    fn test_several_inputs_become_pages() {
        let cli = Cli::parse_from(["emf2svg-conv", "p1.emf", "p2.emf", "-o", "book.html"]);
        let options = build_options(&cli).unwrap();
        assert_eq!(options["emffile"], json!(["p1.emf", "p2.emf"]));
        assert_eq!(options["htmlfile"], "book.html");
        assert!(options.get("library").is_none());
    }

    #[test]
    fn test_resource_path_requires_linking() {
        assert!(Cli::try_parse_from(["emf2svg-conv", "a.emf", "--resource-path", "res"]).is_err());

        let cli = Cli::parse_from([
            "emf2svg-conv",
            "a.emf",
            "--link-resources",
            "--resource-path",
            "res",
        ]);
        let options = build_options(&cli).unwrap();
        assert_eq!(options["linkresources"], true);
        assert_eq!(options["resourcepath"], "res");
    }
}
