//! Turning characters into node trees
//!
//! Physical characters become a single char node. A virtual character's
//! packet is executed the way a DVI driver would execute it, and every
//! horizontal run of glyphs set without an intervening push, pop, font
//! change, vertical move or rule is collected into one box.
//!
//! Each push opens a frame at the cursor. Everything set inside the
//! frame is positioned relative to that point, and the matching pop
//! closes the frame into a box placed where the push happened, relative
//! to the enclosing frame. Nested pushes therefore give nested boxes.

use crate::error::{FontError, Result};
use crate::font::{FontHandle, ScaledFont, VirtualFont};
use crate::node::{BoxNode, Node};
use crate::scaler::Scaler;
use crate::traits::NodeFactory;
use crate::types::{Dimen, FixWord};
use crate::vf::Instruction;

impl ScaledFont {
    /// Builds the node for `code`
    ///
    /// Returns `Ok(None)` when the font has no glyph for `code`. A virtual
    /// character that sets a single run without any push or pop comes back
    /// as that run's box, anything else as one box wrapping its parts.
    pub fn build_char_node(
        self: &FontHandle,
        code: u32,
        factory: &dyn NodeFactory,
    ) -> Result<Option<Node>> {
        match self.as_virtual() {
            None if self.has_glyph(code) => Ok(Some(factory.char_node(code, self))),
            None => Ok(None),
            Some(vf) => Interpreter::new(self, vf, factory, code).run(),
        }
    }
}

/// DVI position and spacing registers
#[derive(Debug, Clone, Copy, Default)]
struct Registers {
    h: Dimen,
    v: Dimen,
    w: Dimen,
    x: Dimen,
    y: Dimen,
    z: Dimen,
}

/// One push level: what pop restores, plus the boxes set since the push
///
/// The saved `h` and `v` are the frame's origin.
struct Level<'a> {
    saved: Registers,
    font: Option<&'a FontHandle>,
    children: Vec<Node>,
}

struct Interpreter<'a> {
    font: &'a ScaledFont,
    vf: &'a VirtualFont,
    factory: &'a dyn NodeFactory,
    code: u32,
    scaler: Scaler,
    regs: Registers,
    stack: Vec<Level<'a>>,
    current: Option<&'a FontHandle>,
    run: Option<BoxNode>,
    /// Boxes at the character origin
    root: Vec<Node>,
    runs: usize,
    framed: bool,
}

impl<'a> Interpreter<'a> {
    fn new(font: &'a ScaledFont, vf: &'a VirtualFont, factory: &'a dyn NodeFactory, code: u32) -> Self {
        let current = vf
            .program()
            .default_font()
            .and_then(|number| vf.local_font(number));
        Self {
            font,
            vf,
            factory,
            code,
            scaler: *font.scaler(),
            regs: Registers::default(),
            stack: Vec::new(),
            current,
            run: None,
            root: Vec::new(),
            runs: 0,
            framed: false,
        }
    }

    fn run(mut self) -> Result<Option<Node>> {
        let vf = self.vf;
        let Some(program) = vf.program().char(self.code) else {
            return Ok(None);
        };
        for instruction in &program.instructions {
            self.step(instruction)?;
        }
        self.close_run();
        if !self.stack.is_empty() {
            log::debug!(
                "Character {:#x} of {} leaves {} push levels open",
                self.code,
                self.font.actual_font_key(),
                self.stack.len()
            );
            while !self.stack.is_empty() {
                self.pop()?;
            }
        }

        let in_tfm = self.font.metrics().exists(self.code);
        let width = match self.font.get_width(self.code).filter(|_| in_tfm) {
            Some(width) => width,
            None => self.scale(program.tfm_width)?,
        };
        let mut children = std::mem::take(&mut self.root);
        if !self.framed && self.runs == 1 && children.len() == 1 {
            let run = children.remove(0);
            self.check_advance(run.width(), width);
            return Ok(Some(run));
        }
        self.check_advance(self.regs.h, width);
        let (height, depth) = match (self.font.get_height(self.code), self.font.get_depth(self.code)) {
            (Some(height), Some(depth)) if in_tfm => (height, depth),
            _ => {
                let (_, height, depth) = extents(&children);
                (height, depth)
            }
        };
        Ok(Some(Node::Box(BoxNode {
            shift: Dimen::ZERO,
            offset: Dimen::ZERO,
            width,
            height,
            depth,
            children,
        })))
    }

    fn check_advance(&self, advance: Dimen, width: Dimen) {
        if advance != width {
            log::debug!(
                "Character {:#x} of {} advances {} but declares {}",
                self.code,
                self.font.actual_font_key(),
                advance,
                width
            );
        }
    }

    fn step(&mut self, instruction: &Instruction) -> Result<()> {
        match instruction {
            Instruction::SetChar(c) => {
                if let Some(node) = self.glyph(*c)? {
                    self.append(node);
                }
            }
            Instruction::PutChar(c) => {
                self.close_run();
                if let Some(node) = self.glyph(*c)? {
                    self.emit(node);
                }
            }
            Instruction::SetRule { height, width } => {
                let width = self.rule(*height, *width)?;
                self.regs.h += width;
            }
            Instruction::PutRule { height, width } => {
                self.rule(*height, *width)?;
            }
            Instruction::Push => {
                self.close_run();
                self.framed = true;
                self.stack.push(Level {
                    saved: self.regs,
                    font: self.current,
                    children: Vec::new(),
                });
            }
            Instruction::Pop => {
                self.close_run();
                self.pop()?;
            }
            Instruction::MoveRight(amount) => self.regs.h += self.scale(*amount)?,
            Instruction::MoveW(amount) => {
                if let Some(amount) = amount {
                    self.regs.w = self.scale(*amount)?;
                }
                self.regs.h += self.regs.w;
            }
            Instruction::MoveX(amount) => {
                if let Some(amount) = amount {
                    self.regs.x = self.scale(*amount)?;
                }
                self.regs.h += self.regs.x;
            }
            Instruction::MoveDown(amount) => {
                self.close_run();
                self.regs.v += self.scale(*amount)?;
            }
            Instruction::MoveY(amount) => {
                self.close_run();
                if let Some(amount) = amount {
                    self.regs.y = self.scale(*amount)?;
                }
                self.regs.v += self.regs.y;
            }
            Instruction::MoveZ(amount) => {
                self.close_run();
                if let Some(amount) = amount {
                    self.regs.z = self.scale(*amount)?;
                }
                self.regs.v += self.regs.z;
            }
            Instruction::SelectFont(number) => {
                self.close_run();
                let vf = self.vf;
                let font = vf
                    .local_font(*number)
                    .ok_or(FontError::UndefinedLocalFont(*number))?;
                self.current = Some(font);
            }
            Instruction::Special(_) | Instruction::NoOp => {}
        }
        Ok(())
    }

    fn scale(&self, amount: FixWord) -> Result<Dimen> {
        self.scaler.try_scale(amount)
    }

    /// Origin of the innermost open frame
    fn origin(&self) -> (Dimen, Dimen) {
        self.stack
            .last()
            .map_or((Dimen::ZERO, Dimen::ZERO), |level| (level.saved.h, level.saved.v))
    }

    /// Boxes of the innermost open frame
    fn children(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(level) => &mut level.children,
            None => &mut self.root,
        }
    }

    /// Restores the registers and font of the last push and places its frame
    fn pop(&mut self) -> Result<()> {
        let level = self.stack.pop().ok_or(FontError::StackUnderflow(self.code))?;
        self.regs = level.saved;
        self.current = level.font;
        let (h, v) = self.origin();
        if let Some(frame) = frame_box(level.children, level.saved.h - h, level.saved.v - v) {
            self.children().push(frame);
        }
        Ok(())
    }

    /// The node for `c` in the current font, `None` if the font lacks it
    fn glyph(&self, c: u32) -> Result<Option<Node>> {
        let font = self.current.ok_or_else(|| {
            FontError::UndefinedLocalFont(self.vf.program().default_font().unwrap_or(0))
        })?;
        let node = font.build_char_node(c, self.factory)?;
        if node.is_none() {
            log::warn!(
                "Character {:#x} of {} uses {:#x}, which {} does not have",
                self.code,
                self.font.actual_font_key(),
                c,
                font.actual_font_key()
            );
        }
        Ok(node)
    }

    /// Adds a glyph to the current run and moves past it
    fn append(&mut self, node: Node) {
        let (h, v) = self.origin();
        let regs = self.regs;
        let run = self.run.get_or_insert_with(|| BoxNode {
            offset: regs.h - h,
            shift: regs.v - v,
            ..BoxNode::default()
        });
        let gap = regs.h - h - (run.offset + run.width);
        if gap != Dimen::ZERO {
            run.push(self.factory.kern_node(gap));
        }
        let advance = node.width();
        run.push(node);
        self.regs.h += advance;
    }

    /// Places a rule at the cursor and returns its width
    fn rule(&mut self, height: FixWord, width: FixWord) -> Result<Dimen> {
        self.close_run();
        let height = self.scale(height)?;
        let width = self.scale(width)?;
        if height > Dimen::ZERO && width > Dimen::ZERO {
            let rule = self.factory.rule_node(width, height, Dimen::ZERO);
            self.emit(rule);
        }
        Ok(width)
    }

    /// A box at the cursor holding just `node`
    fn emit(&mut self, node: Node) {
        let (h, v) = self.origin();
        let mut standalone = BoxNode {
            offset: self.regs.h - h,
            shift: self.regs.v - v,
            ..BoxNode::default()
        };
        standalone.push(node);
        self.children().push(Node::Box(standalone));
    }

    fn close_run(&mut self) {
        if let Some(run) = self.run.take().filter(|run| !run.is_empty()) {
            self.runs += 1;
            self.children().push(Node::Box(run));
        }
    }
}

/// Wraps the boxes of a closed frame, placed at `offset` and `shift`
///
/// A frame holding a single box at its own origin is that box. Empty
/// frames leave nothing behind.
fn frame_box(mut children: Vec<Node>, offset: Dimen, shift: Dimen) -> Option<Node> {
    let at_origin = matches!(
        children.as_slice(),
        [Node::Box(only)] if only.offset == Dimen::ZERO && only.shift == Dimen::ZERO
    );
    if at_origin {
        if let Some(Node::Box(mut only)) = children.pop() {
            only.offset = offset;
            only.shift = shift;
            return Some(Node::Box(only));
        }
    }
    if children.is_empty() {
        return None;
    }
    let (width, height, depth) = extents(&children);
    Some(Node::Box(BoxNode {
        shift,
        offset,
        width,
        height,
        depth,
        children,
    }))
}

/// Right edge, height and depth covered by boxes placed in one frame
fn extents(children: &[Node]) -> (Dimen, Dimen, Dimen) {
    children.iter().filter_map(Node::as_box).fold(
        (Dimen::ZERO, Dimen::ZERO, Dimen::ZERO),
        |(width, height, depth), b| {
            (
                width.max(b.offset + b.width),
                height.max(b.height - b.shift),
                depth.max(b.depth + b.shift),
            )
        },
    )
}
