//! # Kombat
//!
//! Runs a headless CPU-vs-CPU match and prints the result.
//!
//! Usage: `kombat [--config <path>] [--fast]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use kombat_engine::config::CONFIG_FILE;
use kombat_engine::{run, EngineConfig, RunMode};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Command-line options.
struct Args {
    config: PathBuf,
    mode: RunMode,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: PathBuf::from(CONFIG_FILE),
        mode: RunMode::RealTime,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--fast" => args.mode = RunMode::Fast,
            "--config" => {
                args.config = iter
                    .next()
                    .map(PathBuf::from)
                    .context("--config needs a path")?;
            },
            other => bail!("unknown argument `{other}`"),
        }
    }
    Ok(args)
}

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("kombat=info".parse()?))
        .init();

    info!("Kombat {}", env!("CARGO_PKG_VERSION"));

    let args = parse_args()?;
    let mut config = EngineConfig::load_from(&args.config);
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", args.config.display()))?;

    let report = run(&config, args.mode)?;
    println!("{}", report.summary());

    info!("Kombat shutdown complete");
    Ok(())
}
