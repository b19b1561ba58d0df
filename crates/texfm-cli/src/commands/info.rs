//! Info command implementation
//!
//! Displays a font's header, parameters and, for virtual fonts, the local
//! fonts it was resolved against.

use anyhow::{Context, Result};
use serde::Serialize;
use texfm_core::ScaledFont;
use texfm_fontdb::FontResolver;

use crate::cli::InfoArgs;

const PARAM_NAMES: [&str; 7] = [
    "slant",
    "space",
    "space_stretch",
    "space_shrink",
    "x_height",
    "quad",
    "extra_space",
];

#[derive(Serialize)]
struct FontInfo {
    name: String,
    kind: &'static str,
    design_size: String,
    actual_size: String,
    scale_factor: i64,
    checksum: String,
    coding_scheme: Option<String>,
    family: Option<String>,
    first_char: u8,
    last_char: u8,
    params: Vec<Param>,
    local_fonts: Vec<LocalFont>,
}

#[derive(Serialize)]
struct Param {
    number: usize,
    name: String,
    value: String,
    sp: i32,
}

#[derive(Serialize)]
struct LocalFont {
    number: u32,
    font: String,
    scale_factor: i64,
}

pub fn run(resolver: &FontResolver, args: &InfoArgs) -> Result<()> {
    let key = args.font.key();
    let font = resolver
        .resolve(&key)
        .with_context(|| format!("Failed to resolve {key}"))?;
    let info = collect(&font);

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize font info")?;
        println!("{json}");
        return Ok(());
    }

    println!("{} ({})", info.name, info.kind);
    println!("  design size:  {}", info.design_size);
    println!("  actual size:  {}", info.actual_size);
    println!("  scale factor: {}", info.scale_factor);
    println!("  checksum:     {}", info.checksum);
    if let Some(scheme) = &info.coding_scheme {
        println!("  coding:       {scheme}");
    }
    if let Some(family) = &info.family {
        println!("  family:       {family}");
    }
    println!("  characters:   {}..={}", info.first_char, info.last_char);
    if !info.params.is_empty() {
        println!();
        println!("Parameters:");
        for param in &info.params {
            println!("  {:>2} {:<14} {}", param.number, param.name, param.value);
        }
    }
    if !info.local_fonts.is_empty() {
        println!();
        println!("Local fonts:");
        for local in &info.local_fonts {
            println!("  {:>3} {} (scaled {})", local.number, local.font, local.scale_factor);
        }
    }
    Ok(())
}

fn collect(font: &ScaledFont) -> FontInfo {
    let metrics = font.metrics();
    let params = (1..=metrics.param_count())
        .filter_map(|n| {
            let value = font.get_font_dimen(n)?;
            let name = PARAM_NAMES
                .get(n - 1)
                .map_or_else(|| format!("param{n}"), |s| (*s).to_string());
            // the slant is a ratio, not a length
            let shown = if n == 1 {
                format!("{:.6}", f64::from(value.value()) / 65536.0)
            } else {
                value.to_string()
            };
            Some(Param {
                number: n,
                name,
                value: shown,
                sp: value.value(),
            })
        })
        .collect();
    let local_fonts = font
        .as_virtual()
        .map(|vf| {
            vf.local_fonts()
                .iter()
                .map(|(number, local)| LocalFont {
                    number: *number,
                    font: local.actual_font_key().to_string(),
                    scale_factor: local.get_scale_factor(),
                })
                .collect()
        })
        .unwrap_or_default();

    FontInfo {
        name: font.actual_font_key().to_string(),
        kind: if font.is_virtual() { "virtual" } else { "physical" },
        design_size: font.get_design_size().to_string(),
        actual_size: font.get_actual_size().to_string(),
        scale_factor: font.get_scale_factor(),
        checksum: format!("{:#010x}", font.get_checksum()),
        coding_scheme: metrics.coding_scheme().map(str::to_string),
        family: metrics.family().map(str::to_string),
        first_char: metrics.first_char(),
        last_char: metrics.last_char(),
        params,
        local_fonts,
    }
}
