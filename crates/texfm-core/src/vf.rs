//! VF decoding
//!
//! A virtual font is a preamble followed by font definitions and character
//! packets in any order, closed by a postamble. Packets are DVI fragments;
//! they are decoded into [`Instruction`]s here so the interpreter never sees
//! raw opcodes.

use std::collections::BTreeMap;

use crate::error::VirtualFontError;
use crate::reader::{ByteReader, OutOfBounds};
use crate::types::FixWord;

const PRE: u8 = 247;
const POST: u8 = 248;
const VF_ID: u8 = 202;
const LONG_CHAR: u8 = 242;
const FNT_DEF1: u8 = 243;
const FNT_DEF4: u8 = 246;

/// One decoded packet instruction
///
/// Movement amounts and rule sizes are fix_words relative to the size the
/// virtual font is used at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Typeset a character and move right by its width
    SetChar(u32),
    /// Typeset a character without moving
    PutChar(u32),
    SetRule { height: FixWord, width: FixWord },
    PutRule { height: FixWord, width: FixWord },
    Push,
    Pop,
    MoveRight(FixWord),
    /// Move right by `w`, first setting it when a value is given
    MoveW(Option<FixWord>),
    MoveX(Option<FixWord>),
    MoveDown(FixWord),
    MoveY(Option<FixWord>),
    MoveZ(Option<FixWord>),
    SelectFont(u32),
    /// `xxx` payload, meaningless for metrics
    Special(Vec<u8>),
    NoOp,
}

/// A `fnt_def` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFontDef {
    pub number: u32,
    pub checksum: u32,
    /// Size relative to the virtual font's own size
    pub scaled_size: FixWord,
    pub design_size: FixWord,
    pub area: String,
    pub name: String,
}

impl LocalFontDef {
    /// Area and name joined the way the file names the font
    pub fn full_name(&self) -> String {
        format!("{}{}", self.area, self.name)
    }
}

/// A `char_def` entry with its decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharProgram {
    pub code: u32,
    /// Width from the companion TFM, used only as a cross-check
    pub tfm_width: FixWord,
    pub instructions: Vec<Instruction>,
}

/// An immutable, decoded VF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfProgram {
    comment: String,
    checksum: u32,
    design_size: FixWord,
    fonts: Vec<LocalFontDef>,
    chars: BTreeMap<u32, CharProgram>,
}

fn truncated(OutOfBounds(at): OutOfBounds) -> VirtualFontError {
    VirtualFontError::Truncated(at)
}

impl VfProgram {
    pub fn decode(bytes: &[u8]) -> Result<Self, VirtualFontError> {
        let mut r = ByteReader::new(bytes);
        let pre = r.u8().map_err(truncated)?;
        if pre != PRE {
            return Err(VirtualFontError::BadPreamble(pre));
        }
        let id = r.u8().map_err(truncated)?;
        if id != VF_ID {
            return Err(VirtualFontError::BadIdentification(id));
        }
        let comment_len = r.u8().map_err(truncated)?;
        let comment = String::from_utf8_lossy(r.bytes(usize::from(comment_len)).map_err(truncated)?)
            .into_owned();
        let checksum = r.u32().map_err(truncated)?;
        let design_size = r.fix_word().map_err(truncated)?;

        let mut fonts: Vec<LocalFontDef> = Vec::new();
        let mut chars = BTreeMap::new();
        loop {
            let offset = r.position();
            let opcode = r.u8().map_err(|_| VirtualFontError::MissingPostamble)?;
            match opcode {
                0..=241 => {
                    let length = u32::from(opcode);
                    let code = u32::from(r.u8().map_err(truncated)?);
                    let tfm_width = FixWord(r.unsigned(3).map_err(truncated)? as i32);
                    let program = decode_char(&mut r, code, tfm_width, length, &fonts)?;
                    insert_char(&mut chars, program);
                }
                LONG_CHAR => {
                    let length = r.u32().map_err(truncated)?;
                    let code = r.u32().map_err(truncated)?;
                    let tfm_width = r.fix_word().map_err(truncated)?;
                    let program = decode_char(&mut r, code, tfm_width, length, &fonts)?;
                    insert_char(&mut chars, program);
                }
                FNT_DEF1..=FNT_DEF4 => {
                    let def = decode_font_def(&mut r, usize::from(opcode - FNT_DEF1) + 1)?;
                    if fonts.iter().any(|f| f.number == def.number) {
                        return Err(VirtualFontError::DuplicateFont(def.number));
                    }
                    fonts.push(def);
                }
                POST => break,
                _ => return Err(VirtualFontError::UnexpectedOpcode { opcode, offset }),
            }
        }

        log::debug!(
            "Decoded VF: {} local fonts, {} characters",
            fonts.len(),
            chars.len()
        );
        Ok(Self {
            comment,
            checksum,
            design_size,
            fonts,
            chars,
        })
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn design_size(&self) -> FixWord {
        self.design_size
    }

    /// Local fonts in definition order
    pub fn fonts(&self) -> &[LocalFontDef] {
        &self.fonts
    }

    pub fn font(&self, number: u32) -> Option<&LocalFontDef> {
        self.fonts.iter().find(|f| f.number == number)
    }

    /// The font a packet starts with: the first one defined
    pub fn default_font(&self) -> Option<u32> {
        self.fonts.first().map(|f| f.number)
    }

    pub fn char(&self, code: u32) -> Option<&CharProgram> {
        self.chars.get(&code)
    }

    pub fn chars(&self) -> impl Iterator<Item = &CharProgram> {
        self.chars.values()
    }
}

fn insert_char(chars: &mut BTreeMap<u32, CharProgram>, program: CharProgram) {
    let code = program.code;
    if chars.insert(code, program).is_some() {
        log::warn!("Character {code:#x} is defined twice in VF, keeping the later one");
    }
}

fn decode_font_def(r: &mut ByteReader<'_>, number_len: usize) -> Result<LocalFontDef, VirtualFontError> {
    let number = r.unsigned(number_len).map_err(truncated)?;
    let checksum = r.u32().map_err(truncated)?;
    let scaled_size = r.fix_word().map_err(truncated)?;
    let design_size = r.fix_word().map_err(truncated)?;
    let area_len = usize::from(r.u8().map_err(truncated)?);
    let name_len = usize::from(r.u8().map_err(truncated)?);
    let area = String::from_utf8_lossy(r.bytes(area_len).map_err(truncated)?).into_owned();
    let name = String::from_utf8_lossy(r.bytes(name_len).map_err(truncated)?).into_owned();
    Ok(LocalFontDef {
        number,
        checksum,
        scaled_size,
        design_size,
        area,
        name,
    })
}

fn decode_char(
    r: &mut ByteReader<'_>,
    code: u32,
    tfm_width: FixWord,
    length: u32,
    fonts: &[LocalFontDef],
) -> Result<CharProgram, VirtualFontError> {
    let start = r.position();
    let packet = r.bytes(length as usize).map_err(|_| VirtualFontError::Truncated(start))?;
    let instructions = decode_packet(packet, code, start)?;

    let defined = |font: u32| fonts.iter().any(|f| f.number == font);
    let mut uses_default = false;
    let mut selected = false;
    for instruction in &instructions {
        match instruction {
            Instruction::SelectFont(font) => {
                if !defined(*font) {
                    return Err(VirtualFontError::UndefinedFont { code, font: *font });
                }
                selected = true;
            }
            Instruction::SetChar(_) | Instruction::PutChar(_) if !selected => uses_default = true,
            _ => {}
        }
    }
    if uses_default && fonts.is_empty() {
        return Err(VirtualFontError::UndefinedFont { code, font: 0 });
    }

    Ok(CharProgram {
        code,
        tfm_width,
        instructions,
    })
}

/// Decodes the DVI subset allowed in packets
fn decode_packet(packet: &[u8], code: u32, base: usize) -> Result<Vec<Instruction>, VirtualFontError> {
    let mut r = ByteReader::new(packet);
    let overrun = |_: OutOfBounds| VirtualFontError::PacketOverrun {
        code,
        length: packet.len() as u32,
    };
    let mut instructions = Vec::new();
    while !r.is_at_end() {
        let offset = base + r.position();
        let opcode = r.u8().map_err(overrun)?;
        let instruction = match opcode {
            0..=127 => Instruction::SetChar(u32::from(opcode)),
            128..=131 => Instruction::SetChar(r.unsigned(usize::from(opcode - 127)).map_err(overrun)?),
            132 | 137 => {
                let height = r.fix_word().map_err(overrun)?;
                let width = r.fix_word().map_err(overrun)?;
                if opcode == 132 {
                    Instruction::SetRule { height, width }
                } else {
                    Instruction::PutRule { height, width }
                }
            }
            133..=136 => Instruction::PutChar(r.unsigned(usize::from(opcode - 132)).map_err(overrun)?),
            138 => Instruction::NoOp,
            141 => Instruction::Push,
            142 => Instruction::Pop,
            143..=146 => Instruction::MoveRight(FixWord(r.signed(usize::from(opcode - 142)).map_err(overrun)?)),
            147 => Instruction::MoveW(None),
            148..=151 => Instruction::MoveW(Some(FixWord(r.signed(usize::from(opcode - 147)).map_err(overrun)?))),
            152 => Instruction::MoveX(None),
            153..=156 => Instruction::MoveX(Some(FixWord(r.signed(usize::from(opcode - 152)).map_err(overrun)?))),
            157..=160 => Instruction::MoveDown(FixWord(r.signed(usize::from(opcode - 156)).map_err(overrun)?)),
            161 => Instruction::MoveY(None),
            162..=165 => Instruction::MoveY(Some(FixWord(r.signed(usize::from(opcode - 161)).map_err(overrun)?))),
            166 => Instruction::MoveZ(None),
            167..=170 => Instruction::MoveZ(Some(FixWord(r.signed(usize::from(opcode - 166)).map_err(overrun)?))),
            171..=234 => Instruction::SelectFont(u32::from(opcode - 171)),
            235..=238 => Instruction::SelectFont(r.unsigned(usize::from(opcode - 234)).map_err(overrun)?),
            239..=242 => {
                let len = r.unsigned(usize::from(opcode - 238)).map_err(overrun)?;
                Instruction::Special(r.bytes(len as usize).map_err(overrun)?.to_vec())
            }
            // bop, eop, fnt_def, pre, post and undefined opcodes
            _ => return Err(VirtualFontError::UnexpectedOpcode { opcode, offset }),
        };
        instructions.push(instruction);
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{Packet, VfBuilder};

    const HALF: FixWord = FixWord(1 << 19);

    #[test]
    fn test_preamble_and_fonts() {
        let bytes = VfBuilder::new(12)
            .comment("made by hand")
            .checksum(42)
            .font(0, "cmr12", FixWord::ONE, 12)
            .font(7, "cmsy10", HALF, 10)
            .char(65, HALF, Packet::new().set_char(65))
            .build();
        let vf = VfProgram::decode(&bytes).unwrap();
        assert_eq!(vf.comment(), "made by hand");
        assert_eq!(vf.checksum(), 42);
        assert_eq!(vf.design_size(), FixWord(12 << 20));
        assert_eq!(vf.default_font(), Some(0));
        let font = vf.font(7).unwrap();
        assert_eq!(font.full_name(), "cmsy10");
        assert_eq!(font.scaled_size, HALF);
        assert_eq!(font.design_size, FixWord(10 << 20));
    }

    #[test]
    fn test_packets_decode_to_instructions() {
        let bytes = VfBuilder::new(10)
            .font(0, "a", FixWord::ONE, 10)
            .font(1, "b", FixWord::ONE, 10)
            .char(
                1,
                FixWord::ONE,
                Packet::new()
                    .push()
                    .right1(-3)
                    .set_char(200)
                    .w(HALF)
                    .w0()
                    .down(HALF)
                    .font(1)
                    .put_char(66)
                    .special(b"color push")
                    .nop()
                    .set_rule(HALF, HALF)
                    .pop(),
            )
            .build();
        let vf = VfProgram::decode(&bytes).unwrap();
        let program = vf.char(1).unwrap();
        assert_eq!(program.tfm_width, FixWord::ONE);
        assert_eq!(
            program.instructions,
            vec![
                Instruction::Push,
                Instruction::MoveRight(FixWord(-3)),
                Instruction::SetChar(200),
                Instruction::MoveW(Some(HALF)),
                Instruction::MoveW(None),
                Instruction::MoveDown(HALF),
                Instruction::SelectFont(1),
                Instruction::PutChar(66),
                Instruction::Special(b"color push".to_vec()),
                Instruction::NoOp,
                Instruction::SetRule {
                    height: HALF,
                    width: HALF
                },
                Instruction::Pop,
            ]
        );
    }

    #[test]
    fn test_long_char_definitions() {
        let bytes = VfBuilder::new(10)
            .font(0, "a", FixWord::ONE, 10)
            .char(0x1234, FixWord(-5), Packet::new().set_char(0x1_0000))
            .build();
        let vf = VfProgram::decode(&bytes).unwrap();
        let program = vf.char(0x1234).unwrap();
        assert_eq!(program.tfm_width, FixWord(-5));
        assert_eq!(program.instructions, vec![Instruction::SetChar(0x1_0000)]);
    }

    #[test]
    fn test_forward_font_reference_is_rejected() {
        let bytes = VfBuilder::new(10)
            .font(0, "a", FixWord::ONE, 10)
            .char(1, FixWord::ONE, Packet::new().font(3).set_char(1))
            .font(3, "b", FixWord::ONE, 10)
            .build();
        assert_eq!(
            VfProgram::decode(&bytes),
            Err(VirtualFontError::UndefinedFont { code: 1, font: 3 })
        );
    }

    #[test]
    fn test_default_font_must_exist() {
        let bytes = VfBuilder::new(10)
            .char(1, FixWord::ONE, Packet::new().set_char(1))
            .build();
        assert_eq!(
            VfProgram::decode(&bytes),
            Err(VirtualFontError::UndefinedFont { code: 1, font: 0 })
        );
        // rules alone need no font
        let bytes = VfBuilder::new(10)
            .char(1, FixWord::ONE, Packet::new().set_rule(HALF, HALF))
            .build();
        assert!(VfProgram::decode(&bytes).is_ok());
    }

    #[test]
    fn test_illegal_opcodes_in_packets() {
        // bop
        let bytes = VfBuilder::new(10)
            .font(0, "a", FixWord::ONE, 10)
            .char(1, FixWord::ONE, Packet::new().raw(139))
            .build();
        assert!(matches!(
            VfProgram::decode(&bytes),
            Err(VirtualFontError::UnexpectedOpcode { opcode: 139, .. })
        ));
    }

    #[test]
    fn test_truncated_packet() {
        // right4 with its argument cut off
        let bytes = VfBuilder::new(10)
            .font(0, "a", FixWord::ONE, 10)
            .char(1, FixWord::ONE, Packet::new().raw(146).raw(0))
            .build();
        assert_eq!(
            VfProgram::decode(&bytes),
            Err(VirtualFontError::PacketOverrun { code: 1, length: 2 })
        );
    }

    #[test]
    fn test_bad_preamble_and_missing_postamble() {
        assert_eq!(VfProgram::decode(&[1, 2, 3]), Err(VirtualFontError::BadPreamble(1)));
        assert_eq!(VfProgram::decode(&[247, 3]), Err(VirtualFontError::BadIdentification(3)));
        let mut bytes = VfBuilder::new(10).build();
        bytes.retain(|b| *b != 248);
        assert_eq!(VfProgram::decode(&bytes), Err(VirtualFontError::MissingPostamble));
        assert!(matches!(
            VfProgram::decode(&bytes[..5]),
            Err(VirtualFontError::Truncated(_))
        ));
    }

    #[test]
    fn test_duplicate_local_fonts_are_rejected() {
        let bytes = VfBuilder::new(10)
            .font(0, "a", FixWord::ONE, 10)
            .font(0, "b", FixWord::ONE, 10)
            .build();
        assert_eq!(VfProgram::decode(&bytes), Err(VirtualFontError::DuplicateFont(0)));
    }

    #[test]
    fn test_later_char_definition_wins() {
        let bytes = VfBuilder::new(10)
            .font(0, "a", FixWord::ONE, 10)
            .char(1, FixWord::ONE, Packet::new().set_char(1))
            .char(1, HALF, Packet::new().set_char(2))
            .build();
        let vf = VfProgram::decode(&bytes).unwrap();
        assert_eq!(vf.char(1).unwrap().tfm_width, HALF);
        assert_eq!(vf.chars().count(), 1);
    }
}
