//! Error types for texfm
//!
//! Decode failures are split by file format, everything that can go wrong
//! while resolving fonts or running a virtual character lives on [`FontError`].
//! All errors are `Clone` so a failed initialisation can be handed to every
//! caller waiting on the same cache entry.

use thiserror::Error;

use crate::types::Dimen;

pub type Result<T> = std::result::Result<T, FontError>;

/// Main error type for texfm
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FontError {
    #[error("Font not found: {0}")]
    NotFound(String),

    #[error("Font loading failed for {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("Invalid TFM data: {0}")]
    Metric(#[from] MetricError),

    #[error("Invalid VF data: {0}")]
    Virtual(#[from] VirtualFontError),

    #[error("Invalid font size: {0}")]
    InvalidSize(Dimen),

    #[error("Fixed-point value {0:#010x} does not fit the scaled range")]
    FixWordRange(i32),

    #[error("Local font {0} is not defined")]
    UndefinedLocalFont(u32),

    #[error("Pop on an empty stack in character {0:#x}")]
    StackUnderflow(u32),

    #[error("Cyclic font reference: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),
}

impl FontError {
    /// The backing file is absent, as opposed to present but broken
    pub fn is_not_found(&self) -> bool {
        matches!(self, FontError::NotFound(_))
    }
}

/// TFM decoding errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetricError {
    #[error("File truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Character range is inverted: bc={bc}, ec={ec}")]
    InvalidRange { bc: u16, ec: u16 },

    #[error("Character range exceeds 255: ec={0}")]
    RangeTooLarge(u16),

    #[error("Header has {0} words, at least 2 are required")]
    HeaderTooShort(u16),

    #[error("Length fields add up to {computed} words, file declares {declared}")]
    LengthMismatch { computed: u32, declared: u16 },

    #[error("Table {table} has invalid size {size}")]
    InvalidTableSize { table: &'static str, size: u16 },

    #[error("Index {index} for character {code} exceeds {table} table of size {len}")]
    IndexOutOfRange {
        table: &'static str,
        code: u32,
        index: usize,
        len: usize,
    },

    #[error("Entry {index} of {table} table must be zero")]
    NonZeroFirstEntry { table: &'static str, index: usize },

    #[error("Entry {index} of {table} table is out of fix_word range")]
    FixWordRange { table: &'static str, index: usize },

    #[error("Design size {0:#010x} is smaller than 1pt")]
    DesignSizeTooSmall(i32),
}

/// VF decoding errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VirtualFontError {
    #[error("File truncated at byte {0}")]
    Truncated(usize),

    #[error("Expected preamble opcode 247, found {0}")]
    BadPreamble(u8),

    #[error("Unknown VF identification byte {0}")]
    BadIdentification(u8),

    #[error("Unexpected opcode {opcode} at byte {offset}")]
    UnexpectedOpcode { opcode: u8, offset: usize },

    #[error("Character {code:#x} references local font {font} before its definition")]
    UndefinedFont { code: u32, font: u32 },

    #[error("Local font {0} is defined twice")]
    DuplicateFont(u32),

    #[error("Packet for character {code:#x} overruns its declared length {length}")]
    PacketOverrun { code: u32, length: u32 },

    #[error("Missing postamble")]
    MissingPostamble,
}
