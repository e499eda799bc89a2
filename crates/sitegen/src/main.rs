/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Command-line entry point for sitegen.
 */

use anyhow::{Context, Result};
use clap::Parser;
use sitegen_core::{BuildError, BuildOptions, SiteConfig, StylesheetConfig};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sitegen", version)]
#[command(about = "Compile JSX-style component and page templates into a static site")]
struct Args {
    /// Project root; config paths are relative to it
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Config file [default: <root>/_sitegen.yml]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Component template directory
    #[arg(long, value_name = "DIR")]
    components: Option<PathBuf>,

    /// Page template directory
    #[arg(long, value_name = "DIR")]
    pages: Option<PathBuf>,

    /// Output directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// SCSS entry point
    #[arg(long, value_name = "FILE", conflicts_with = "no_styles")]
    stylesheet: Option<PathBuf>,

    /// Skip the stylesheet step
    #[arg(long)]
    no_styles: bool,

    /// Fail when two component files derive the same name
    #[arg(long)]
    strict_names: bool,

    /// Worker threads (0 = available parallelism)
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        match e.downcast_ref::<BuildError>() {
            Some(build_error @ BuildError::Batch { .. }) => {
                for failure in build_error.failures() {
                    error!("{}", failure);
                }
                error!("{}", build_error);
            }
            _ => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "sitegen=info",
        1 => "sitegen=debug",
        _ => "sitegen=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();
}

fn run(args: &Args) -> Result<()> {
    if !args.root.is_dir() {
        anyhow::bail!("Project root is not a directory: {}", args.root.display());
    }

    let mut config = match &args.config {
        Some(path) => SiteConfig::load(path)?,
        None => SiteConfig::discover(&args.root)?,
    };
    apply_overrides(&mut config, args)?;

    let options = BuildOptions::resolve(&args.root, &config);
    let started = Instant::now();
    let summary = sitegen_core::build(options)?;

    info!(
        components = summary.components.len(),
        pages = summary.pages.len(),
        stylesheet = summary.stylesheet.is_some(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Built site"
    );
    info!("Done.");
    Ok(())
}

/// Command-line values replace config values. Paths given on the command
/// line are relative to the working directory, not the project root.
fn apply_overrides(config: &mut SiteConfig, args: &Args) -> Result<()> {
    if let Some(dir) = &args.components {
        config.components = absolute(dir)?;
    }
    if let Some(dir) = &args.pages {
        config.pages = absolute(dir)?;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = absolute(dir)?;
    }
    if let Some(entry) = &args.stylesheet {
        let stylesheet = config.stylesheet.get_or_insert_with(StylesheetConfig::default);
        stylesheet.entry = absolute(entry)?;
    }
    if args.no_styles {
        config.stylesheet = None;
    }
    if args.strict_names {
        config.duplicate_components = sitegen_core::DuplicateComponents::Error;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}
