//! The seams between fonts, storage and the typesetter
//!
//! - [`FontLoader`] - where font bytes come from
//! - [`NodeFactory`] - how leaves of a character's node tree are made

use crate::error::Result;
use crate::font::FontHandle;
use crate::node::{CharNode, KernNode, Node, RuleNode};
use crate::types::Dimen;

/// The files making up one font name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// A physical font: its TFM file
    Tfm(Vec<u8>),
    /// A virtual font: the VF program and its companion TFM
    Virtual { vf: Vec<u8>, tfm: Vec<u8> },
}

impl FontSource {
    pub fn is_virtual(&self) -> bool {
        matches!(self, FontSource::Virtual { .. })
    }
}

/// Finds the files for a font name
///
/// ```ignore
/// struct Embedded;
///
/// impl FontLoader for Embedded {
///     fn load(&self, name: &str) -> Result<FontSource> {
///         match name {
///             "cmr10" => Ok(FontSource::Tfm(CMR10.to_vec())),
///             _ => Err(FontError::NotFound(name.to_string())),
///         }
///     }
/// }
/// ```
pub trait FontLoader: Send + Sync {
    /// Returns the files for `name`, or [`FontError::NotFound`](crate::FontError::NotFound)
    fn load(&self, name: &str) -> Result<FontSource>;
}

/// Creates the leaves of a node tree
///
/// Typesetters that keep their own node representation hook in here;
/// everything else uses [`DefaultNodeFactory`].
pub trait NodeFactory {
    fn char_node(&self, character: u32, font: &FontHandle) -> Node {
        Node::Char(CharNode::new(character, font.clone()))
    }

    fn rule_node(&self, width: Dimen, height: Dimen, depth: Dimen) -> Node {
        Node::Rule(RuleNode {
            width,
            height,
            depth,
        })
    }

    fn kern_node(&self, width: Dimen) -> Node {
        Node::Kern(KernNode { width })
    }
}

/// Plain [`Node`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNodeFactory;

impl NodeFactory for DefaultNodeFactory {}
