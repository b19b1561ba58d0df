//! Char command implementation
//!
//! Prints one character's metrics and the node tree it typesets as.

use std::fmt::{self, Write};

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use texfm_core::{DefaultNodeFactory, Node};
use texfm_fontdb::FontResolver;

use crate::cli::CharArgs;

pub fn run(resolver: &FontResolver, args: &CharArgs) -> Result<()> {
    let key = args.font.key();
    let font = resolver
        .resolve(&key)
        .with_context(|| format!("Failed to resolve {key}"))?;
    let code = args.code;
    if !font.has_glyph(code) {
        bail!("{} has no character {code:#x}", font.actual_font_key());
    }
    let node = font
        .build_char_node(code, &DefaultNodeFactory)
        .with_context(|| format!("Failed to build character {code:#x} of {key}"))?;

    if args.json {
        let report = json!({
            "font": font.actual_font_key().to_string(),
            "code": code,
            "width": font.get_width(code).map(|d| d.value()),
            "height": font.get_height(code).map(|d| d.value()),
            "depth": font.get_depth(code).map(|d| d.value()),
            "italic": font.get_italic_correction(code).map(|d| d.value()),
            "node": node.as_ref().map(node_json),
        });
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize node tree")?;
        println!("{json}");
        return Ok(());
    }

    println!("{} char {code:#x}", font.actual_font_key());
    let show = |d: Option<texfm_core::Dimen>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    println!("  width:  {}", show(font.get_width(code)));
    println!("  height: {}", show(font.get_height(code)));
    println!("  depth:  {}", show(font.get_depth(code)));
    println!("  italic: {}", show(font.get_italic_correction(code)));
    if let Some(node) = &node {
        println!();
        print!("{}", render_tree(node)?);
    }
    Ok(())
}

/// One line per node, children indented below their box
pub fn render_tree(node: &Node) -> Result<String> {
    let mut out = String::new();
    write_node(&mut out, node, 0).context("Failed to render node tree")?;
    Ok(out)
}

fn write_node<W: Write>(out: &mut W, node: &Node, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth + 1);
    match node {
        Node::Char(c) => writeln!(
            out,
            "{indent}char {:#x} from {} ({} x {} + {})",
            c.character,
            c.font.actual_font_key(),
            c.width(),
            c.height(),
            c.depth()
        )?,
        Node::Rule(r) => writeln!(out, "{indent}rule {} x {} + {}", r.width, r.height, r.depth)?,
        Node::Kern(k) => writeln!(out, "{indent}kern {}", k.width)?,
        Node::Box(b) => writeln!(
            out,
            "{indent}box at ({}, {}) {} x {} + {}",
            b.offset, b.shift, b.width, b.height, b.depth
        )?,
    }
    if let Node::Box(b) = node {
        for child in &b.children {
            write_node(out, child, depth + 1)?;
        }
    }
    Ok(())
}

/// Node tree as JSON, lengths in scaled points
pub fn node_json(node: &Node) -> Value {
    match node {
        Node::Char(c) => json!({
            "type": "char",
            "code": c.character,
            "font": c.font.actual_font_key().to_string(),
            "width": c.width().value(),
            "height": c.height().value(),
            "depth": c.depth().value(),
        }),
        Node::Rule(r) => json!({
            "type": "rule",
            "width": r.width.value(),
            "height": r.height.value(),
            "depth": r.depth.value(),
        }),
        Node::Kern(k) => json!({
            "type": "kern",
            "width": k.width.value(),
        }),
        Node::Box(b) => json!({
            "type": "box",
            "offset": b.offset.value(),
            "shift": b.shift.value(),
            "width": b.width.value(),
            "height": b.height.value(),
            "depth": b.depth.value(),
            "children": b.children.iter().map(node_json).collect::<Vec<_>>(),
        }),
    }
}
