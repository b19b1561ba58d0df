//! Big-endian cursor over font bytes
//!
//! Thin wrapper around [`read_fonts::FontData`] that tracks a position,
//! which is all the sequential TFM and VF layouts need.

use read_fonts::types::Uint24;
use read_fonts::FontData;

use crate::types::FixWord;

/// Position-tracking reader; every read reports the offset it failed at
#[derive(Clone)]
pub(crate) struct ByteReader<'a> {
    data: FontData<'a>,
    raw: &'a [u8],
    pos: usize,
}

/// Offset of the read that ran past the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutOfBounds(pub usize);

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            data: FontData::new(bytes),
            raw: bytes,
            pos: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn u8(&mut self) -> Result<u8, OutOfBounds> {
        let value = self.data.read_at::<u8>(self.pos).map_err(|_| OutOfBounds(self.pos))?;
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, OutOfBounds> {
        let value = self.data.read_at::<u16>(self.pos).map_err(|_| OutOfBounds(self.pos))?;
        self.pos += 2;
        Ok(value)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, OutOfBounds> {
        let value = self.data.read_at::<u32>(self.pos).map_err(|_| OutOfBounds(self.pos))?;
        self.pos += 4;
        Ok(value)
    }

    pub(crate) fn fix_word(&mut self) -> Result<FixWord, OutOfBounds> {
        let value = self.data.read_at::<i32>(self.pos).map_err(|_| OutOfBounds(self.pos))?;
        self.pos += 4;
        Ok(FixWord(value))
    }

    /// Unsigned big-endian integer of 1 to 4 bytes
    pub(crate) fn unsigned(&mut self, len: usize) -> Result<u32, OutOfBounds> {
        match len {
            1 => self.u8().map(u32::from),
            2 => self.u16().map(u32::from),
            3 => {
                let value = self
                    .data
                    .read_at::<Uint24>(self.pos)
                    .map_err(|_| OutOfBounds(self.pos))?;
                self.pos += 3;
                Ok(value.to_u32())
            }
            _ => self.u32(),
        }
    }

    /// Signed big-endian integer of 1 to 4 bytes
    pub(crate) fn signed(&mut self, len: usize) -> Result<i32, OutOfBounds> {
        let raw = self.unsigned(len)?;
        let shift = 32 - 8 * len.clamp(1, 4) as u32;
        Ok(((raw << shift) as i32) >> shift)
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], OutOfBounds> {
        let slice = self
            .raw
            .get(self.pos..self.pos.saturating_add(len))
            .ok_or(OutOfBounds(self.pos))?;
        self.pos += len;
        Ok(slice)
    }
}
