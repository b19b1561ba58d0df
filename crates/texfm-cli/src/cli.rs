//! CLI argument definitions using Clap v4

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use texfm_core::{Dimen, FontKey};

/// texfm - inspect TeX font metrics and virtual fonts
#[derive(Parser, Debug)]
#[command(name = "texfm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Font directory to search, before those in TEXFM_FONT_PATH
    #[arg(short = 'd', long = "font-dir", global = true)]
    pub font_dirs: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display the header, parameters and local fonts of a font
    #[command(alias = "i")]
    Info(InfoArgs),

    /// Display the metrics and node tree of one character
    #[command(alias = "c")]
    Char(CharArgs),
}

/// Which font instance to open
#[derive(Args, Debug)]
pub struct FontArgs {
    /// Font name, e.g. cmr10
    pub font: String,

    /// Size to load the font at, e.g. 12pt
    #[arg(long)]
    pub at: Option<Dimen>,

    /// Scale in thousandths of the design size
    #[arg(long)]
    pub scale: Option<i64>,
}

impl FontArgs {
    pub fn key(&self) -> FontKey {
        let mut key = FontKey::new(self.font.as_str());
        if let Some(size) = self.at {
            key = key.at(size);
        }
        if let Some(scale) = self.scale {
            key = key.scaled(scale);
        }
        key
    }
}

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub font: FontArgs,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the char command
#[derive(Args, Debug)]
pub struct CharArgs {
    #[command(flatten)]
    pub font: FontArgs,

    /// Character code: decimal, 0x-prefixed hex, or a single character
    #[arg(value_parser = parse_code)]
    pub code: u32,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Parses `65`, `0x41` or `A`
pub fn parse_code(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex code {s:?}: {e}"));
    }
    if let Ok(code) = s.parse::<u32>() {
        return Ok(code);
    }
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(u32::from(c)),
        _ => Err(format!("invalid character code {s:?}")),
    }
}
