//! fix_word to scaled point conversion
//!
//! TeX never multiplies a fix_word by a size directly. It splits the size
//! until it fits in 23 bits and then combines the fix_word's bytes in stages,
//! so every intermediate product stays within 32 bits. The results differ from
//! exact rounding in the last place, and DVI consumers depend on getting the
//! same last place, so the staging is reproduced exactly here.

use crate::error::{FontError, Result};
use crate::types::{Dimen, FixWord};

/// Sizes at or above 2048pt leave no room for the staged division
pub const MAX_SIZE: i32 = 1 << 27;

/// Converts `word` relative to `size` into scaled points
pub fn convert(word: FixWord, size: Dimen) -> Result<Dimen> {
    Scaler::new(size)?.try_scale(word)
}

/// The design size stored in a TFM or VF header, in scaled points
pub fn design_size_to_dimen(word: FixWord) -> Dimen {
    Dimen(word.raw() >> 4)
}

/// Precomputed staging factors for one size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaler {
    size: Dimen,
    z: i64,
    alpha: i64,
    beta: i64,
}

impl Scaler {
    pub fn new(size: Dimen) -> Result<Self> {
        if size.value() <= 0 || size.value() >= MAX_SIZE {
            return Err(FontError::InvalidSize(size));
        }
        let mut z = i64::from(size.value());
        let mut alpha: i64 = 16;
        while z >= 1 << 23 {
            z /= 2;
            alpha += alpha;
        }
        let beta = 256 / alpha;
        alpha *= z;
        Ok(Self {
            size,
            z,
            alpha,
            beta,
        })
    }

    pub fn size(&self) -> Dimen {
        self.size
    }

    fn staged(&self, word: FixWord) -> i64 {
        let [b0, b1, b2, b3] = word.bytes();
        let z = self.z;
        let sw = (((i64::from(b3) * z) / 256 + i64::from(b2) * z) / 256 + i64::from(b1) * z)
            / self.beta;
        // b0 is the signed integer part: 255 is the usual -1, anything
        // else only shows up in VF movement amounts
        sw + i64::from(b0 as i8) * self.alpha
    }

    /// Scales a word, failing when the result leaves the 32-bit range
    pub fn try_scale(&self, word: FixWord) -> Result<Dimen> {
        i32::try_from(self.staged(word))
            .map(Dimen)
            .map_err(|_| FontError::FixWordRange(word.raw()))
    }

    /// Scales a word already known to be in range
    ///
    /// TFM tables are range-checked when decoded, so for their entries this
    /// is exact; anything outside the 32-bit range saturates.
    pub fn scale(&self, word: FixWord) -> Dimen {
        let sw = self.staged(word);
        Dimen(sw.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_of_cmr10_at_12pt() {
        // QUAD R 1.000003 in cmr10.pl
        let quad = FixWord(0x0010_0003);
        assert_eq!(convert(quad, Dimen::pt(12)), Ok(Dimen(786434)));
    }

    #[test]
    fn test_negative_words_wrap_through_alpha() {
        let minus_half = FixWord(-(1 << 19));
        assert_eq!(convert(minus_half, Dimen::pt(10)), Ok(Dimen(-327680)));
        let minus_one = FixWord(-(1 << 20));
        assert_eq!(convert(minus_one, Dimen::pt(10)), Ok(-Dimen::pt(10)));
    }

    #[test]
    fn test_staging_kicks_in_for_large_sizes() {
        // 200pt needs one halving of z
        let size = Dimen::pt(200);
        let scaler = Scaler::new(size).unwrap();
        assert_eq!(scaler.scale(FixWord::ONE), size);
        assert_eq!(scaler.scale(FixWord(1 << 19)), Dimen::pt(100));
    }

    #[test]
    fn test_staged_result_truncates_instead_of_rounding() {
        // 1/3 of 10pt: exact value is 218453.33sp
        let third = FixWord((1 << 20) / 3);
        assert_eq!(convert(third, Dimen::pt(10)), Ok(Dimen(218453)));
    }

    #[test]
    fn test_invalid_sizes_are_errors() {
        assert_eq!(
            Scaler::new(Dimen::ZERO),
            Err(FontError::InvalidSize(Dimen::ZERO))
        );
        assert!(Scaler::new(Dimen(-5)).is_err());
        assert!(Scaler::new(Dimen(MAX_SIZE)).is_err());
        assert!(Scaler::new(Dimen(MAX_SIZE - 1)).is_ok());
    }

    #[test]
    fn test_out_of_range_words_are_checked() {
        let scaler = Scaler::new(Dimen::pt(1000)).unwrap();
        // 100 times the size does not fit in 32 bits at 1000pt
        let huge = FixWord(100 << 20);
        assert_eq!(scaler.try_scale(huge), Err(FontError::FixWordRange(huge.raw())));
        assert_eq!(scaler.scale(huge), Dimen(i32::MAX));
        // 20 times still fits at 10pt
        let twenty = FixWord(20 << 20);
        assert_eq!(convert(twenty, Dimen::pt(10)), Ok(Dimen::pt(200)));
    }

    #[test]
    fn test_scaling_is_linear_in_size() {
        let word = FixWord(0x0006_E38E); // 0.430555
        let at10 = convert(word, Dimen::pt(10)).unwrap().value();
        let at20 = convert(word, Dimen::pt(20)).unwrap().value();
        assert!((at20 - 2 * at10).abs() <= 1);
    }
}
