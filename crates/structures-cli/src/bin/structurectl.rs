//! structurectl: a small driver for the structures engine.
//!
//! Points a `FilesystemLoader` at a directory of `.rep` files, requires a
//! root feature, and reports the resulting structure's exported
//! interface — or the failing `EngineError`, colored and non-zero-exit.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use structures_cli::FilesystemLoader;
use structures_core::{Engine, EngineError};
use tracing::info;

/// structurectl: load a root structure and print its interface.
#[derive(Parser, Debug)]
#[command(name = "structurectl", version, about = "Drive the structures engine over a directory of .rep files")]
struct Args {
    /// Directory containing `<name>.rep` files.
    #[arg(long, short = 'r')]
    root: std::path::PathBuf,

    /// Feature/structure name to require (looks for `<root>/<feature>.rep`).
    feature: String,

    /// Emit the interface as JSON instead of a human-readable list.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "structurectl=info,warn".to_owned()))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => Ok(()),
        Err(err) => {
            report_error(&args, &err);
            std::process::exit(1);
        }
    }
}

/// Plain text to stderr by default; under `--json`, the underlying
/// `EngineError` (if the failure came from one) serialized instead, so a
/// caller scripting against `structurectl` doesn't have to scrape prose.
fn report_error(args: &Args, err: &anyhow::Error) {
    if args.json {
        if let Some(engine_err) = err.chain().find_map(|cause| cause.downcast_ref::<EngineError>()) {
            if let Ok(json) = serde_json::to_string_pretty(engine_err) {
                eprintln!("{json}");
                return;
            }
        }
    }
    eprintln!("{} {err:#}", "error:".red().bold());
}

fn run(args: &Args) -> Result<()> {
    let loader = FilesystemLoader::new(&args.root);
    let mut engine = Engine::new(Box::new(loader));
    let feature = structures_common::symbol::intern(&args.feature);

    info!(root = %args.root.display(), feature = %args.feature, "requiring root feature");
    engine
        .require(feature)
        .with_context(|| format!("requiring '{}'", args.feature))?;

    let id = resolve_reported_structure(&engine, feature);
    let structure = engine.get(id).context("root structure vanished after require")?;

    let names: Vec<&str> = structure.interface().iter().map(|s| s.as_str()).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        println!("{} {}", "structure:".green().bold(), structure.name.map_or("#<anonymous>".to_owned(), |n| n.to_string()));
        for name in &names {
            println!("  {name}");
        }
    }
    Ok(())
}

/// `require` doesn't hand back the structure it named — only the registry
/// does. Anonymous requires (source that defines directly in `current`
/// rather than via a nested `(structure ...)` form) fall back to
/// reporting `current` itself.
fn resolve_reported_structure(engine: &Engine, feature: structures_common::Symbol) -> structures_core::StructureId {
    engine.get_structure(feature).unwrap_or_else(|| engine.current())
}
