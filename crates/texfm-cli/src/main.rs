//! texfm CLI: inspect TeX font metrics and virtual fonts

mod cli;
mod commands;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use texfm_fontdb::{DirectoryLoader, FontResolver, SearchPath};

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let resolver = resolver(&cli);
    match &cli.command {
        Commands::Info(args) => commands::info::run(&resolver, args),
        Commands::Char(args) => commands::character::run(&resolver, args),
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Directories from the command line first, then `TEXFM_FONT_PATH`
fn resolver(cli: &Cli) -> FontResolver {
    let mut search_path = SearchPath::new();
    for dir in &cli.font_dirs {
        search_path.push(dir.clone());
    }
    for dir in SearchPath::from_env().dirs() {
        search_path.push(dir.clone());
    }
    if search_path.is_empty() {
        log::warn!("No font directories given; use --font-dir or TEXFM_FONT_PATH");
    }
    FontResolver::new(Arc::new(DirectoryLoader::new(search_path)))
}
