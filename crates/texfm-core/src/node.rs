//! Typesetting nodes produced for characters
//!
//! A physical character is a single [`CharNode`]. A virtual character is a
//! [`BoxNode`] tree whose leaves are chars and rules of other fonts.

use crate::font::FontHandle;
use crate::types::Dimen;

/// One element of a node tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Char(CharNode),
    Rule(RuleNode),
    Kern(KernNode),
    Box(BoxNode),
}

impl Node {
    /// Horizontal advance of the node
    pub fn width(&self) -> Dimen {
        match self {
            Node::Char(c) => c.width(),
            Node::Rule(r) => r.width,
            Node::Kern(k) => k.width,
            Node::Box(b) => b.width,
        }
    }

    pub fn height(&self) -> Dimen {
        match self {
            Node::Char(c) => c.height(),
            Node::Rule(r) => r.height,
            Node::Kern(_) => Dimen::ZERO,
            Node::Box(b) => b.height,
        }
    }

    pub fn depth(&self) -> Dimen {
        match self {
            Node::Char(c) => c.depth(),
            Node::Rule(r) => r.depth,
            Node::Kern(_) => Dimen::ZERO,
            Node::Box(b) => b.depth,
        }
    }

    pub fn as_box(&self) -> Option<&BoxNode> {
        match self {
            Node::Box(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<&CharNode> {
        match self {
            Node::Char(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_rule(&self) -> Option<&RuleNode> {
        match self {
            Node::Rule(r) => Some(r),
            _ => None,
        }
    }
}

/// A character of a physical font
///
/// Metrics are looked up in the font on demand.
#[derive(Debug, Clone)]
pub struct CharNode {
    pub character: u32,
    pub font: FontHandle,
}

impl CharNode {
    pub fn new(character: u32, font: FontHandle) -> Self {
        Self { character, font }
    }

    pub fn width(&self) -> Dimen {
        self.font.get_width(self.character).unwrap_or_default()
    }

    pub fn height(&self) -> Dimen {
        self.font.get_height(self.character).unwrap_or_default()
    }

    pub fn depth(&self) -> Dimen {
        self.font.get_depth(self.character).unwrap_or_default()
    }
}

impl PartialEq for CharNode {
    // fonts compare by instance
    fn eq(&self, other: &Self) -> bool {
        self.character == other.character
            && self.font.actual_font_key() == other.font.actual_font_key()
    }
}

/// A filled rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleNode {
    pub width: Dimen,
    pub height: Dimen,
    pub depth: Dimen,
}

/// Horizontal space between two glyphs of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernNode {
    pub width: Dimen,
}

/// A horizontal list of nodes
///
/// `offset` moves the box right and `shift` moves it down, both relative
/// to the origin of the box that contains it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxNode {
    pub shift: Dimen,
    pub offset: Dimen,
    pub width: Dimen,
    pub height: Dimen,
    pub depth: Dimen,
    pub children: Vec<Node>,
}

impl BoxNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and advances the box by its width
    pub fn push(&mut self, node: Node) {
        self.width += node.width();
        self.height = self.height.max(node.height());
        self.depth = self.depth.max(node.depth());
        self.children.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Child boxes in emission order
    pub fn boxes(&self) -> impl Iterator<Item = &BoxNode> {
        self.children.iter().filter_map(Node::as_box)
    }
}
