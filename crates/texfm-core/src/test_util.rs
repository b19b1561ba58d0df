//! Writers for small synthetic TFM and VF files
//!
//! Only what the tests in this workspace need: every character gets at most
//! one tag, lig/kern programs are laid out one per left character, and
//! characters are kept below 256.

use std::collections::BTreeMap;

use crate::types::FixWord;

/// `points` as a header design size
pub fn design_size(points: i32) -> FixWord {
    FixWord(points << 20)
}

#[derive(Debug, Clone, Copy, Default)]
struct CharSpec {
    width: FixWord,
    height: FixWord,
    depth: FixWord,
    italic: FixWord,
    next_larger: Option<u8>,
    extensible: Option<[u8; 4]>,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Kern(u8, FixWord),
    Ligature(u8, u8, u8),
}

/// Builds a TFM file
#[derive(Debug, Clone)]
pub struct TfmBuilder {
    checksum: u32,
    design_size: FixWord,
    coding_scheme: Option<String>,
    chars: BTreeMap<u8, CharSpec>,
    steps: BTreeMap<u8, Vec<Step>>,
    boundary_char: Option<u8>,
    params: Vec<FixWord>,
}

impl TfmBuilder {
    pub fn new(design_points: i32) -> Self {
        Self {
            checksum: 0,
            design_size: design_size(design_points),
            coding_scheme: None,
            chars: BTreeMap::new(),
            steps: BTreeMap::new(),
            boundary_char: None,
            params: Vec::new(),
        }
    }

    pub fn checksum(mut self, checksum: u32) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn coding_scheme(mut self, scheme: &str) -> Self {
        self.coding_scheme = Some(scheme.to_string());
        self
    }

    pub fn char(mut self, code: u8, width: FixWord, height: FixWord, depth: FixWord) -> Self {
        let spec = self.chars.entry(code).or_default();
        spec.width = width;
        spec.height = height;
        spec.depth = depth;
        self
    }

    pub fn italic(mut self, code: u8, italic: FixWord) -> Self {
        self.chars.entry(code).or_default().italic = italic;
        self
    }

    pub fn next_larger(mut self, code: u8, next: u8) -> Self {
        self.chars.entry(code).or_default().next_larger = Some(next);
        self
    }

    pub fn extensible(mut self, code: u8, top: u8, middle: u8, bottom: u8, repeat: u8) -> Self {
        self.chars.entry(code).or_default().extensible = Some([top, middle, bottom, repeat]);
        self
    }

    pub fn kern(mut self, left: u8, right: u8, amount: FixWord) -> Self {
        self.steps.entry(left).or_default().push(Step::Kern(right, amount));
        self
    }

    pub fn ligature(mut self, left: u8, right: u8, op: u8, replacement: u8) -> Self {
        self.steps
            .entry(left)
            .or_default()
            .push(Step::Ligature(right, op, replacement));
        self
    }

    /// Declares `code` as the boundary char in the first lig/kern step
    pub fn boundary_char(mut self, code: u8) -> Self {
        self.boundary_char = Some(code);
        self
    }

    pub fn params(mut self, params: &[FixWord]) -> Self {
        self.params = params.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        fn index_of(table: &mut Vec<FixWord>, value: FixWord) -> u8 {
            match table.iter().position(|v| *v == value) {
                Some(i) => i as u8,
                None => {
                    table.push(value);
                    (table.len() - 1) as u8
                }
            }
        }

        let bc = self.chars.keys().next().copied().unwrap_or(0);
        let ec = self.chars.keys().next_back().copied().unwrap_or(0);

        let mut widths = vec![FixWord::ZERO];
        let mut heights = vec![FixWord::ZERO];
        let mut depths = vec![FixWord::ZERO];
        let mut italics = vec![FixWord::ZERO];
        let mut kerns: Vec<FixWord> = Vec::new();
        let mut lig_kern: Vec<[u8; 4]> = Vec::new();
        let mut exten: Vec<[u8; 4]> = Vec::new();
        let mut char_info = Vec::new();
        if let Some(code) = self.boundary_char {
            lig_kern.push([255, code, 0, 0]);
        }

        for code in bc..=ec {
            let Some(spec) = self.chars.get(&code) else {
                char_info.push([0u8; 4]);
                continue;
            };
            // index 0 marks a missing character, so present ones never use it
            let wi = match widths[1..].iter().position(|v| *v == spec.width) {
                Some(i) => (i + 1) as u8,
                None => {
                    widths.push(spec.width);
                    (widths.len() - 1) as u8
                }
            };
            let hi = index_of(&mut heights, spec.height);
            let di = index_of(&mut depths, spec.depth);
            let ii = index_of(&mut italics, spec.italic);
            let (tag, remainder) = if let Some(steps) = self.steps.get(&code) {
                let start = lig_kern.len() as u8;
                for (n, step) in steps.iter().enumerate() {
                    let skip = if n + 1 == steps.len() { 128 } else { 0 };
                    match *step {
                        Step::Kern(right, amount) => {
                            let k = match kerns.iter().position(|v| *v == amount) {
                                Some(k) => k,
                                None => {
                                    kerns.push(amount);
                                    kerns.len() - 1
                                }
                            };
                            lig_kern.push([skip, right, 128 + (k >> 8) as u8, (k & 0xff) as u8]);
                        }
                        Step::Ligature(right, op, replacement) => {
                            lig_kern.push([skip, right, op, replacement]);
                        }
                    }
                }
                (1u8, start)
            } else if let Some(next) = spec.next_larger {
                (2, next)
            } else if let Some(recipe) = spec.extensible {
                exten.push(recipe);
                (3, (exten.len() - 1) as u8)
            } else {
                (0, 0)
            };
            char_info.push([wi, (hi << 4) | di, (ii << 2) | tag, remainder]);
        }

        let mut header = Vec::new();
        header.extend_from_slice(&self.checksum.to_be_bytes());
        header.extend_from_slice(&self.design_size.raw().to_be_bytes());
        if let Some(scheme) = &self.coding_scheme {
            let mut field = [0u8; 40];
            field[0] = scheme.len() as u8;
            field[1..=scheme.len()].copy_from_slice(scheme.as_bytes());
            header.extend_from_slice(&field);
        }
        let lh = header.len() / 4;

        let counts = [
            lh,
            char_info.len(),
            widths.len(),
            heights.len(),
            depths.len(),
            italics.len(),
            lig_kern.len(),
            kerns.len(),
            exten.len(),
            self.params.len(),
        ];
        let lf = 6 + counts.iter().sum::<usize>();

        let mut out = Vec::with_capacity(lf * 4);
        for value in [
            lf,
            lh,
            usize::from(bc),
            usize::from(ec),
            widths.len(),
            heights.len(),
            depths.len(),
            italics.len(),
            lig_kern.len(),
            kerns.len(),
            exten.len(),
            self.params.len(),
        ] {
            out.extend_from_slice(&(value as u16).to_be_bytes());
        }
        out.extend_from_slice(&header);
        for word in &char_info {
            out.extend_from_slice(word);
        }
        for table in [&widths, &heights, &depths, &italics] {
            for w in table.iter() {
                out.extend_from_slice(&w.raw().to_be_bytes());
            }
        }
        for word in &lig_kern {
            out.extend_from_slice(word);
        }
        for w in &kerns {
            out.extend_from_slice(&w.raw().to_be_bytes());
        }
        for word in &exten {
            out.extend_from_slice(word);
        }
        for w in &self.params {
            out.extend_from_slice(&w.raw().to_be_bytes());
        }
        out
    }
}

/// The instruction bytes of one virtual character
#[derive(Debug, Clone, Default)]
pub struct Packet(Vec<u8>);

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn op_i32(mut self, op: u8, value: i32) -> Self {
        self.0.push(op);
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn set_char(mut self, code: u32) -> Self {
        match code {
            0..=127 => self.0.push(code as u8),
            128..=255 => self.0.extend_from_slice(&[128, code as u8]),
            _ => return self.op_i32(131, code as i32),
        }
        self
    }

    pub fn put_char(mut self, code: u32) -> Self {
        if code < 256 {
            self.0.extend_from_slice(&[133, code as u8]);
            self
        } else {
            self.op_i32(136, code as i32)
        }
    }

    pub fn set_rule(self, height: FixWord, width: FixWord) -> Self {
        self.op_i32(132, height.raw()).raw_i32(width.raw())
    }

    pub fn put_rule(self, height: FixWord, width: FixWord) -> Self {
        self.op_i32(137, height.raw()).raw_i32(width.raw())
    }

    fn raw_i32(mut self, value: i32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn push(mut self) -> Self {
        self.0.push(141);
        self
    }

    pub fn pop(mut self) -> Self {
        self.0.push(142);
        self
    }

    pub fn nop(mut self) -> Self {
        self.0.push(138);
        self
    }

    pub fn right(self, amount: FixWord) -> Self {
        self.op_i32(146, amount.raw())
    }

    /// `right1`: a one-byte signed movement
    pub fn right1(mut self, amount: i8) -> Self {
        self.0.extend_from_slice(&[143, amount as u8]);
        self
    }

    pub fn down(self, amount: FixWord) -> Self {
        self.op_i32(160, amount.raw())
    }

    pub fn w(self, amount: FixWord) -> Self {
        self.op_i32(151, amount.raw())
    }

    pub fn w0(mut self) -> Self {
        self.0.push(147);
        self
    }

    pub fn x(self, amount: FixWord) -> Self {
        self.op_i32(156, amount.raw())
    }

    pub fn x0(mut self) -> Self {
        self.0.push(152);
        self
    }

    pub fn y(self, amount: FixWord) -> Self {
        self.op_i32(165, amount.raw())
    }

    pub fn y0(mut self) -> Self {
        self.0.push(161);
        self
    }

    pub fn z(self, amount: FixWord) -> Self {
        self.op_i32(170, amount.raw())
    }

    pub fn z0(mut self) -> Self {
        self.0.push(166);
        self
    }

    pub fn font(mut self, number: u32) -> Self {
        if number < 64 {
            self.0.push(171 + number as u8);
            self
        } else {
            self.op_i32(238, number as i32)
        }
    }

    pub fn special(mut self, payload: &[u8]) -> Self {
        self.0.push(239);
        self.0.push(payload.len() as u8);
        self.0.extend_from_slice(payload);
        self
    }

    /// Any opcode byte, for malformed packets
    pub fn raw(mut self, byte: u8) -> Self {
        self.0.push(byte);
        self
    }
}

#[derive(Debug, Clone)]
enum VfItem {
    Font {
        number: u32,
        checksum: u32,
        scaled: FixWord,
        design: FixWord,
        name: String,
    },
    Char {
        code: u32,
        width: FixWord,
        packet: Packet,
    },
}

/// Builds a VF file; items are written in the order they were added
#[derive(Debug, Clone)]
pub struct VfBuilder {
    checksum: u32,
    design_size: FixWord,
    comment: String,
    items: Vec<VfItem>,
}

impl VfBuilder {
    pub fn new(design_points: i32) -> Self {
        Self {
            checksum: 0,
            design_size: design_size(design_points),
            comment: String::new(),
            items: Vec::new(),
        }
    }

    pub fn checksum(mut self, checksum: u32) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Defines local font `number` at `scaled` times the virtual font's size
    pub fn font(self, number: u32, name: &str, scaled: FixWord, design_points: i32) -> Self {
        self.font_with_checksum(number, name, scaled, design_points, 0)
    }

    pub fn font_with_checksum(
        mut self,
        number: u32,
        name: &str,
        scaled: FixWord,
        design_points: i32,
        checksum: u32,
    ) -> Self {
        self.items.push(VfItem::Font {
            number,
            checksum,
            scaled,
            design: design_size(design_points),
            name: name.to_string(),
        });
        self
    }

    pub fn char(mut self, code: u32, width: FixWord, packet: Packet) -> Self {
        self.items.push(VfItem::Char {
            code,
            width,
            packet,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![247, 202, self.comment.len() as u8];
        out.extend_from_slice(self.comment.as_bytes());
        out.extend_from_slice(&self.checksum.to_be_bytes());
        out.extend_from_slice(&self.design_size.raw().to_be_bytes());
        for item in &self.items {
            match item {
                VfItem::Font {
                    number,
                    checksum,
                    scaled,
                    design,
                    name,
                } => {
                    if *number < 256 {
                        out.extend_from_slice(&[243, *number as u8]);
                    } else {
                        out.push(246);
                        out.extend_from_slice(&number.to_be_bytes());
                    }
                    out.extend_from_slice(&checksum.to_be_bytes());
                    out.extend_from_slice(&scaled.raw().to_be_bytes());
                    out.extend_from_slice(&design.raw().to_be_bytes());
                    out.extend_from_slice(&[0, name.len() as u8]);
                    out.extend_from_slice(name.as_bytes());
                }
                VfItem::Char {
                    code,
                    width,
                    packet,
                } => {
                    let bytes = packet.bytes();
                    let short = bytes.len() < 242
                        && *code < 256
                        && (0..1 << 24).contains(&width.raw());
                    if short {
                        out.extend_from_slice(&[bytes.len() as u8, *code as u8]);
                        out.extend_from_slice(&width.raw().to_be_bytes()[1..]);
                    } else {
                        out.push(242);
                        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                        out.extend_from_slice(&code.to_be_bytes());
                        out.extend_from_slice(&width.raw().to_be_bytes());
                    }
                    out.extend_from_slice(bytes);
                }
            }
        }
        out.push(248);
        while out.len() % 4 != 0 {
            out.push(248);
        }
        out
    }
}
