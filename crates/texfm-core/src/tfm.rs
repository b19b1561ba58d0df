//! TFM decoding
//!
//! A TFM file is a sequence of 32-bit words: a 6-word length preamble, the
//! header, one `char_info` word per character, then the width, height,
//! depth, italic, lig/kern, kern, extensible and parameter tables in that
//! order. Characters only store small indices into the dimension tables,
//! which is why the tables are kept verbatim here instead of being expanded
//! per character.
//!
//! Nothing is converted to scaled points at decode time; the same table
//! serves every size the font is used at.

use crate::error::MetricError;
use crate::reader::{ByteReader, OutOfBounds};
use crate::types::{Dimen, FixWord};

const LIG_TAG: u8 = 1;
const LIST_TAG: u8 = 2;
const EXT_TAG: u8 = 3;

/// Instructions with a skip byte above this value stop the program
const STOP_FLAG: u8 = 128;
/// Lig/kern op bytes at or above this value are kerns
const KERN_FLAG: u8 = 128;

/// The packed per-character record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharInfo {
    pub width_index: u8,
    pub height_index: u8,
    pub depth_index: u8,
    pub italic_index: u8,
    pub tag: u8,
    pub remainder: u8,
}

impl CharInfo {
    fn from_word(word: [u8; 4]) -> Self {
        Self {
            width_index: word[0],
            height_index: word[1] >> 4,
            depth_index: word[1] & 0x0f,
            italic_index: word[2] >> 2,
            tag: word[2] & 0x03,
            remainder: word[3],
        }
    }

    /// A zero width index marks a character the font does not have
    pub fn exists(&self) -> bool {
        self.width_index != 0
    }
}

/// One instruction of the lig/kern program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LigKernStep {
    pub skip: u8,
    pub next_char: u8,
    pub op: u8,
    pub remainder: u8,
}

impl LigKernStep {
    fn is_kern(&self) -> bool {
        self.op >= KERN_FLAG
    }

    fn kern_index(&self) -> usize {
        256 * usize::from(self.op - KERN_FLAG) + usize::from(self.remainder)
    }

    /// Where the real program starts when the first step is an indirection
    fn far_start(&self) -> usize {
        256 * usize::from(self.op) + usize::from(self.remainder)
    }
}

/// The pieces an extensible character is built from; zero means absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensibleRecipe {
    pub top: u8,
    pub middle: u8,
    pub bottom: u8,
    pub repeat: u8,
}

/// A ligature step between two characters
///
/// `keep_left`/`keep_right` say which of the original characters survive
/// next to `replacement`, `pass_over` how many of the resulting characters
/// the scanner moves past before looking for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ligature {
    pub replacement: u8,
    pub keep_left: bool,
    pub keep_right: bool,
    pub pass_over: u8,
}

/// What a character's tag points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharTag {
    None,
    LigKern,
    NextLarger(u8),
    Extensible(ExtensibleRecipe),
}

/// An immutable, decoded TFM file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTable {
    checksum: u32,
    design_size: FixWord,
    coding_scheme: Option<String>,
    family: Option<String>,
    seven_bit_safe: bool,
    face: u8,
    bc: u8,
    ec: u8,
    char_info: Vec<CharInfo>,
    widths: Vec<FixWord>,
    heights: Vec<FixWord>,
    depths: Vec<FixWord>,
    italics: Vec<FixWord>,
    lig_kern: Vec<LigKernStep>,
    kerns: Vec<FixWord>,
    extensible: Vec<ExtensibleRecipe>,
    params: Vec<FixWord>,
    boundary_char: Option<u8>,
}

struct Lengths {
    lf: u16,
    lh: u16,
    bc: u16,
    ec: u16,
    nw: u16,
    nh: u16,
    nd: u16,
    ni: u16,
    nl: u16,
    nk: u16,
    ne: u16,
    np: u16,
}

fn truncated(bytes: &[u8]) -> impl Fn(OutOfBounds) -> MetricError + '_ {
    move |OutOfBounds(at)| MetricError::Truncated {
        needed: at + 4,
        actual: bytes.len(),
    }
}

impl MetricTable {
    /// Decodes a complete TFM file
    pub fn decode(bytes: &[u8]) -> Result<Self, MetricError> {
        if bytes.len() < 24 {
            return Err(MetricError::Truncated {
                needed: 24,
                actual: bytes.len(),
            });
        }
        let mut r = ByteReader::new(bytes);
        let oob = truncated(bytes);

        let mut next = || r.u16().map_err(&oob);
        let lengths = Lengths {
            lf: next()?,
            lh: next()?,
            bc: next()?,
            ec: next()?,
            nw: next()?,
            nh: next()?,
            nd: next()?,
            ni: next()?,
            nl: next()?,
            nk: next()?,
            ne: next()?,
            np: next()?,
        };
        Self::check_lengths(&lengths, bytes.len())?;
        let Lengths {
            lh,
            bc,
            ec,
            nw,
            nh,
            nd,
            ni,
            nl,
            nk,
            ne,
            np,
            ..
        } = lengths;

        let header = r.bytes(4 * usize::from(lh)).map_err(&oob)?;
        let checksum = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let design_size = FixWord(i32::from_be_bytes([header[4], header[5], header[6], header[7]]));
        if design_size.raw() < FixWord::ONE.raw() {
            return Err(MetricError::DesignSizeTooSmall(design_size.raw()));
        }
        let coding_scheme = (lh >= 12).then(|| bcpl_string(&header[8..48])).flatten();
        let family = (lh >= 17).then(|| bcpl_string(&header[48..68])).flatten();
        let (seven_bit_safe, face) = if lh >= 18 {
            (header[68] & 0x80 != 0, header[71])
        } else {
            (false, 0)
        };

        let mut char_info = Vec::with_capacity(usize::from(ec - bc + 1));
        for _ in bc..=ec {
            let word = r.bytes(4).map_err(&oob)?;
            char_info.push(CharInfo::from_word([word[0], word[1], word[2], word[3]]));
        }

        let widths = read_dimensions(&mut r, nw, "width", bytes)?;
        let heights = read_dimensions(&mut r, nh, "height", bytes)?;
        let depths = read_dimensions(&mut r, nd, "depth", bytes)?;
        let italics = read_dimensions(&mut r, ni, "italic", bytes)?;

        let mut lig_kern = Vec::with_capacity(usize::from(nl));
        for _ in 0..nl {
            let word = r.bytes(4).map_err(&oob)?;
            lig_kern.push(LigKernStep {
                skip: word[0],
                next_char: word[1],
                op: word[2],
                remainder: word[3],
            });
        }
        let kerns = read_words(&mut r, nk, bytes)?;
        check_range(&kerns, "kern", 0)?;

        let mut extensible = Vec::with_capacity(usize::from(ne));
        for _ in 0..ne {
            let word = r.bytes(4).map_err(&oob)?;
            extensible.push(ExtensibleRecipe {
                top: word[0],
                middle: word[1],
                bottom: word[2],
                repeat: word[3],
            });
        }
        let params = read_words(&mut r, np, bytes)?;
        // the slant is a pure number and may exceed the range
        check_range(&params, "param", 1)?;

        let boundary_char = match lig_kern.first() {
            Some(first) if first.skip == 255 => Some(first.next_char),
            _ => None,
        };

        let table = MetricTable {
            checksum,
            design_size,
            coding_scheme,
            family,
            seven_bit_safe,
            face,
            bc: bc as u8,
            ec: ec as u8,
            char_info,
            widths,
            heights,
            depths,
            italics,
            lig_kern,
            kerns,
            extensible,
            params,
            boundary_char,
        };
        table.check_indices()?;

        log::debug!(
            "Decoded TFM: chars {}..={}, {} widths, {} lig/kern steps, {} params",
            table.bc,
            table.ec,
            table.widths.len(),
            table.lig_kern.len(),
            table.params.len()
        );
        Ok(table)
    }

    fn check_lengths(l: &Lengths, file_len: usize) -> Result<(), MetricError> {
        if l.ec > 255 {
            return Err(MetricError::RangeTooLarge(l.ec));
        }
        if l.bc > l.ec {
            return Err(MetricError::InvalidRange { bc: l.bc, ec: l.ec });
        }
        if l.lh < 2 {
            return Err(MetricError::HeaderTooShort(l.lh));
        }
        for (table, size, max) in [
            ("width", l.nw, 256),
            ("height", l.nh, 16),
            ("depth", l.nd, 16),
            ("italic", l.ni, 64),
        ] {
            if size == 0 || size > max {
                return Err(MetricError::InvalidTableSize { table, size });
            }
        }
        let computed: u32 = [
            6,
            l.lh,
            l.ec - l.bc + 1,
            l.nw,
            l.nh,
            l.nd,
            l.ni,
            l.nl,
            l.nk,
            l.ne,
            l.np,
        ]
        .iter()
        .map(|&n| u32::from(n))
        .sum();
        if computed != u32::from(l.lf) {
            return Err(MetricError::LengthMismatch {
                computed,
                declared: l.lf,
            });
        }
        let needed = 4 * usize::from(l.lf);
        if file_len < needed {
            return Err(MetricError::Truncated {
                needed,
                actual: file_len,
            });
        }
        Ok(())
    }

    fn check_indices(&self) -> Result<(), MetricError> {
        let out_of_range = |table, code: u32, index: usize, len: usize| {
            Err(MetricError::IndexOutOfRange {
                table,
                code,
                index,
                len,
            })
        };
        for (offset, info) in self.char_info.iter().enumerate() {
            if !info.exists() {
                continue;
            }
            let code = u32::from(self.bc) + offset as u32;
            for (table, index, len) in [
                ("width", info.width_index, self.widths.len()),
                ("height", info.height_index, self.heights.len()),
                ("depth", info.depth_index, self.depths.len()),
                ("italic", info.italic_index, self.italics.len()),
            ] {
                if usize::from(index) >= len {
                    return out_of_range(table, code, usize::from(index), len);
                }
            }
            let remainder = usize::from(info.remainder);
            match info.tag {
                LIG_TAG if remainder >= self.lig_kern.len() => {
                    return out_of_range("lig/kern", code, remainder, self.lig_kern.len());
                }
                EXT_TAG if remainder >= self.extensible.len() => {
                    return out_of_range("extensible", code, remainder, self.extensible.len());
                }
                LIST_TAG if !self.exists(u32::from(info.remainder)) => {
                    return out_of_range("char", code, remainder, usize::from(self.ec) + 1);
                }
                _ => {}
            }
        }
        let chars = usize::from(self.ec) + 1;
        let steps = self.lig_kern.len();
        for (index, step) in self.lig_kern.iter().enumerate() {
            let at = index as u32;
            if step.skip > STOP_FLAG {
                // an indirection to the real start of a program
                let start = step.far_start();
                if start >= steps {
                    return out_of_range("lig/kern", at, start, steps);
                }
                continue;
            }
            // the boundary char need not be a glyph of its own
            if self.boundary_char != Some(step.next_char) && !self.exists(u32::from(step.next_char)) {
                return out_of_range("char", at, usize::from(step.next_char), chars);
            }
            if step.is_kern() {
                if step.kern_index() >= self.kerns.len() {
                    return out_of_range("kern", at, step.kern_index(), self.kerns.len());
                }
            } else if !self.exists(u32::from(step.remainder)) {
                return out_of_range("char", at, usize::from(step.remainder), chars);
            }
            let next = index + usize::from(step.skip) + 1;
            if step.skip < STOP_FLAG && next >= steps {
                return out_of_range("lig/kern", at, next, steps);
            }
        }
        Ok(())
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Design size as stored, in points with 20 fractional bits
    pub fn design_size(&self) -> FixWord {
        self.design_size
    }

    pub fn design_size_dimen(&self) -> Dimen {
        crate::scaler::design_size_to_dimen(self.design_size)
    }

    pub fn coding_scheme(&self) -> Option<&str> {
        self.coding_scheme.as_deref()
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn seven_bit_safe(&self) -> bool {
        self.seven_bit_safe
    }

    pub fn face(&self) -> u8 {
        self.face
    }

    pub fn first_char(&self) -> u8 {
        self.bc
    }

    pub fn last_char(&self) -> u8 {
        self.ec
    }

    pub fn boundary_char(&self) -> Option<u8> {
        self.boundary_char
    }

    /// The record for `code`, `None` outside `[bc, ec]`
    pub fn char_info(&self, code: u32) -> Option<&CharInfo> {
        let offset = code.checked_sub(u32::from(self.bc))?;
        self.char_info.get(offset as usize)
    }

    pub fn contains(&self, code: u32) -> bool {
        self.char_info(code).is_some()
    }

    /// In range and actually present in the font
    pub fn exists(&self, code: u32) -> bool {
        self.char_info(code).is_some_and(CharInfo::exists)
    }

    pub fn width(&self, code: u32) -> Option<FixWord> {
        self.lookup(code, &self.widths, |ci| ci.width_index)
    }

    pub fn height(&self, code: u32) -> Option<FixWord> {
        self.lookup(code, &self.heights, |ci| ci.height_index)
    }

    pub fn depth(&self, code: u32) -> Option<FixWord> {
        self.lookup(code, &self.depths, |ci| ci.depth_index)
    }

    pub fn italic(&self, code: u32) -> Option<FixWord> {
        self.lookup(code, &self.italics, |ci| ci.italic_index)
    }

    fn lookup(
        &self,
        code: u32,
        table: &[FixWord],
        index: impl Fn(&CharInfo) -> u8,
    ) -> Option<FixWord> {
        let info = self.char_info(code)?;
        // indices of absent characters are not validated
        Some(
            table
                .get(usize::from(index(info)))
                .copied()
                .unwrap_or(FixWord::ZERO),
        )
    }

    pub fn char_tag(&self, code: u32) -> CharTag {
        let Some(info) = self.char_info(code).filter(|ci| ci.exists()) else {
            return CharTag::None;
        };
        match info.tag {
            LIG_TAG => CharTag::LigKern,
            LIST_TAG => CharTag::NextLarger(info.remainder),
            EXT_TAG => self
                .extensible
                .get(usize::from(info.remainder))
                .map_or(CharTag::None, |recipe| CharTag::Extensible(*recipe)),
            _ => CharTag::None,
        }
    }

    /// Finds the lig/kern step for the pair, if the program has one
    fn find_step(&self, left: u32, right: u32) -> Option<&LigKernStep> {
        let right = u8::try_from(right).ok()?;
        let info = self.char_info(left).filter(|ci| ci.exists())?;
        if info.tag != LIG_TAG {
            return None;
        }
        let mut index = usize::from(info.remainder);
        let first = self.lig_kern.get(index)?;
        if first.skip > STOP_FLAG {
            index = first.far_start();
        }
        loop {
            let step = self.lig_kern.get(index)?;
            if step.next_char == right && step.skip <= STOP_FLAG {
                return Some(step);
            }
            if step.skip >= STOP_FLAG {
                return None;
            }
            index += usize::from(step.skip) + 1;
        }
    }

    /// Kern between two characters, zero when the program has none
    pub fn kerning(&self, left: u32, right: u32) -> FixWord {
        match self.find_step(left, right) {
            Some(step) if step.is_kern() => self
                .kerns
                .get(step.kern_index())
                .copied()
                .unwrap_or(FixWord::ZERO),
            _ => FixWord::ZERO,
        }
    }

    pub fn ligature(&self, left: u32, right: u32) -> Option<Ligature> {
        let step = self.find_step(left, right).filter(|s| !s.is_kern())?;
        Some(Ligature {
            replacement: step.remainder,
            keep_left: step.op & 0x02 != 0,
            keep_right: step.op & 0x01 != 0,
            pass_over: step.op >> 2,
        })
    }

    /// Raw parameter by zero-based index (0 is the slant)
    pub fn param(&self, index: usize) -> Option<FixWord> {
        self.params.get(index).copied()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

fn bcpl_string(bytes: &[u8]) -> Option<String> {
    let (&len, rest) = bytes.split_first()?;
    let len = usize::from(len).min(rest.len());
    if len == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&rest[..len]).into_owned())
}

fn read_words(r: &mut ByteReader<'_>, count: u16, bytes: &[u8]) -> Result<Vec<FixWord>, MetricError> {
    (0..count)
        .map(|_| r.fix_word().map_err(truncated(bytes)))
        .collect()
}

fn check_range(words: &[FixWord], table: &'static str, skip: usize) -> Result<(), MetricError> {
    match words.iter().enumerate().skip(skip).find(|(_, w)| !w.is_in_range()) {
        Some((index, _)) => Err(MetricError::FixWordRange { table, index }),
        None => Ok(()),
    }
}

fn read_dimensions(
    r: &mut ByteReader<'_>,
    count: u16,
    table: &'static str,
    bytes: &[u8],
) -> Result<Vec<FixWord>, MetricError> {
    let words = read_words(r, count, bytes)?;
    if words.first().is_some_and(|w| *w != FixWord::ZERO) {
        return Err(MetricError::NonZeroFirstEntry { table, index: 0 });
    }
    check_range(&words, table, 0)?;
    Ok(words)
}
