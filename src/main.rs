//! phantom - A static mirror generator for Ghost blogs.

mod cli;
mod config;
mod core;
mod logger;
mod mirror;
mod pipeline;
mod utils;
mod vcs;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::SiteConfig;

fn main() {
    if let Err(e) = run() {
        log!("error"; "{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = SiteConfig::load(&cli)?;
    if let Some(path) = &config.config_path {
        debug!("config"; "using {}", path.display());
    }

    match &cli.command {
        Commands::Setup { .. } => cli::setup::setup_repo(&config),
        Commands::Generate { .. } => cli::generate::generate_site(&config).map(|_| ()),
        Commands::Preview { .. } => cli::preview::serve_site(&config),
        Commands::Deploy { date } => cli::deploy::deploy_site(&config, date.as_deref()),
        Commands::AddDomain { domain } => cli::domain::add_domain(&config, domain),
    }
}
