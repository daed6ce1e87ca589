mod aquarium;
mod renderer;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use shoal_core::PlacementConfig;
use tracing_subscriber::EnvFilter;

/// A terminal fish tank whose inhabitants won't stop talking.
#[derive(Debug, Parser)]
#[command(name = "shoal", version)]
struct Args {
    /// Number of fish in the tank.
    #[arg(short, long, default_value_t = 18)]
    fish: usize,

    /// JSON file overriding placement policy (lanes, rows, bubble sizes).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plan rows for a compact device.
    #[arg(long)]
    compact: bool,

    /// Write engine logs to this file (the terminal is taken by the UI).
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("shoal_core=debug,shoal=info")),
            )
            .init();
    }

    let config = match &args.config {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            PlacementConfig::from_json(&data)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => renderer::terminal_config(),
    };

    renderer::run(args.fish, args.compact, config)
}
