//! Fonts at a concrete size
//!
//! A [`ScaledFont`] pairs a decoded metric table with the size it is used at.
//! Virtual fonts additionally carry their VF program and the local fonts it
//! refers to, already resolved at the right sizes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FontError, Result};
use crate::scaler::Scaler;
use crate::tfm::{CharTag, Ligature, MetricTable};
use crate::types::{Dimen, FixWord, FontKey};
use crate::vf::VfProgram;

/// Shared handle to a resolved font; node trees point into the resolver
/// through these
pub type FontHandle = Arc<ScaledFont>;

/// Zero-based parameter indices
const SLANT: usize = 0;
const SPACE: usize = 1;
const X_HEIGHT: usize = 4;
const QUAD: usize = 5;

/// The size a key asks for
///
/// An explicit size wins over `SCALE`, which is parts per thousand of
/// the design size. Without either the design size is used.
pub fn actual_size(key: &FontKey, design_size: Dimen) -> Result<Dimen> {
    let size = match (key.size(), key.scale()) {
        (Some(size), scale) => {
            if scale.is_some() {
                log::debug!("{key}: explicit size overrides SCALE");
            }
            size
        }
        (None, Some(scale)) => {
            let too_large = FontError::InvalidSize(Dimen(i32::MAX));
            let scaled = i64::from(design_size.value())
                .checked_mul(scale)
                .ok_or_else(|| too_large.clone())?
                / 1000;
            let scaled = i32::try_from(scaled).map_err(|_| too_large)?;
            Dimen(scaled)
        }
        (None, None) => design_size,
    };
    // validates 0 < size < 2048pt
    Scaler::new(size)?;
    Ok(size)
}

/// Physical or virtual
pub enum FontKind {
    Physical,
    Virtual(VirtualFont),
}

/// The VF side of a virtual font
pub struct VirtualFont {
    program: Arc<VfProgram>,
    local_fonts: BTreeMap<u32, FontHandle>,
}

impl VirtualFont {
    pub fn program(&self) -> &VfProgram {
        &self.program
    }

    pub fn local_font(&self, number: u32) -> Option<&FontHandle> {
        self.local_fonts.get(&number)
    }

    pub fn local_fonts(&self) -> &BTreeMap<u32, FontHandle> {
        &self.local_fonts
    }
}

/// A font instance at one size
pub struct ScaledFont {
    metrics: Arc<MetricTable>,
    kind: FontKind,
    scaler: Scaler,
    scale_factor: i64,
    font_key: FontKey,
    actual_font_key: FontKey,
}

impl ScaledFont {
    /// A TFM-only font
    pub fn physical(key: FontKey, metrics: Arc<MetricTable>) -> Result<Self> {
        Self::new(key, metrics, FontKind::Physical)
    }

    /// A virtual font; `local_fonts` must cover every font the program defines
    pub fn virtual_font(
        key: FontKey,
        metrics: Arc<MetricTable>,
        program: Arc<VfProgram>,
        local_fonts: BTreeMap<u32, FontHandle>,
    ) -> Result<Self> {
        if let Some(missing) = program
            .fonts()
            .iter()
            .find(|def| !local_fonts.contains_key(&def.number))
        {
            return Err(FontError::UndefinedLocalFont(missing.number));
        }
        Self::new(
            key,
            metrics,
            FontKind::Virtual(VirtualFont {
                program,
                local_fonts,
            }),
        )
    }

    fn new(key: FontKey, metrics: Arc<MetricTable>, kind: FontKind) -> Result<Self> {
        let design = metrics.design_size_dimen();
        let size = actual_size(&key, design)?;
        let scaler = Scaler::new(size)?;
        let design = i64::from(design.value());
        let scale_factor = (i64::from(size.value()) * 1000 + design / 2) / design;
        let actual_font_key = key.without_scale().at(size);
        Ok(Self {
            metrics,
            kind,
            scaler,
            scale_factor,
            font_key: key,
            actual_font_key,
        })
    }

    pub fn kind(&self) -> &FontKind {
        &self.kind
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, FontKind::Virtual(_))
    }

    pub fn as_virtual(&self) -> Option<&VirtualFont> {
        match &self.kind {
            FontKind::Virtual(vf) => Some(vf),
            FontKind::Physical => None,
        }
    }

    /// The metric table; the companion TFM for virtual fonts
    pub fn metrics(&self) -> &MetricTable {
        &self.metrics
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// The key this font was requested with
    pub fn font_key(&self) -> &FontKey {
        &self.font_key
    }

    /// The key naming the concrete instance: name plus actual size
    pub fn actual_font_key(&self) -> &FontKey {
        &self.actual_font_key
    }

    pub fn get_design_size(&self) -> Dimen {
        self.metrics.design_size_dimen()
    }

    pub fn get_actual_size(&self) -> Dimen {
        self.scaler.size()
    }

    /// Actual size in thousandths of the design size, rounded
    pub fn get_scale_factor(&self) -> i64 {
        self.scale_factor
    }

    pub fn get_checksum(&self) -> u32 {
        self.metrics.checksum()
    }

    fn scaled(&self, word: Option<FixWord>) -> Option<Dimen> {
        word.map(|w| self.scaler.scale(w))
    }

    pub fn get_width(&self, code: u32) -> Option<Dimen> {
        self.scaled(self.metrics.width(code))
    }

    pub fn get_height(&self, code: u32) -> Option<Dimen> {
        self.scaled(self.metrics.height(code))
    }

    pub fn get_depth(&self, code: u32) -> Option<Dimen> {
        self.scaled(self.metrics.depth(code))
    }

    pub fn get_italic_correction(&self, code: u32) -> Option<Dimen> {
        self.scaled(self.metrics.italic(code))
    }

    /// Kern between two characters, zero when the font has none
    pub fn get_kerning(&self, left: u32, right: u32) -> Dimen {
        self.scaler.scale(self.metrics.kerning(left, right))
    }

    pub fn get_ligature(&self, left: u32, right: u32) -> Option<Ligature> {
        self.metrics.ligature(left, right)
    }

    pub fn get_char_tag(&self, code: u32) -> CharTag {
        self.metrics.char_tag(code)
    }

    /// TeX's `\fontdimen n`, counting from 1
    ///
    /// The slant is a pure number and is returned unscaled, in units of
    /// 2^-16.
    pub fn get_font_dimen(&self, n: usize) -> Option<Dimen> {
        let index = n.checked_sub(1)?;
        let word = self.metrics.param(index)?;
        if index == SLANT {
            Some(Dimen(word.raw() >> 4))
        } else {
            Some(self.scaler.scale(word))
        }
    }

    pub fn get_slant(&self) -> Dimen {
        self.get_font_dimen(SLANT + 1).unwrap_or_default()
    }

    pub fn get_space(&self) -> Dimen {
        self.param_dimen(SPACE)
    }

    /// The x-height
    pub fn get_ex(&self) -> Dimen {
        self.param_dimen(X_HEIGHT)
    }

    /// The quad
    pub fn get_em(&self) -> Dimen {
        self.param_dimen(QUAD)
    }

    fn param_dimen(&self, index: usize) -> Dimen {
        self.scaled(self.metrics.param(index)).unwrap_or_default()
    }

    /// Physical fonts have a glyph for every existing TFM character,
    /// virtual fonts for every character with a program
    pub fn has_glyph(&self, code: u32) -> bool {
        match &self.kind {
            FontKind::Physical => self.metrics.exists(code),
            FontKind::Virtual(vf) => vf.program.char(code).is_some(),
        }
    }
}

impl fmt::Debug for ScaledFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaledFont")
            .field("key", &self.actual_font_key.to_string())
            .field("virtual", &self.is_virtual())
            .field("scale_factor", &self.scale_factor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{design_size, TfmBuilder};

    fn fw(value: f64) -> FixWord {
        FixWord((value * f64::from(1 << 20)).round() as i32)
    }

    fn cmr_like() -> Arc<MetricTable> {
        let bytes = TfmBuilder::new(10)
            .checksum(0x4bf1_6079)
            .char(b'A', fw(0.75), fw(0.683), FixWord::ZERO)
            .char(b'V', fw(0.75), fw(0.683), FixWord::ZERO)
            .italic(b'V', fw(0.014))
            .kern(b'A', b'V', fw(-0.111))
            .params(&[
                fw(0.0),
                fw(0.333),
                fw(0.167),
                fw(0.111),
                FixWord(0x0006_E38E),
                FixWord(0x0010_0003),
                fw(0.111),
            ])
            .build();
        Arc::new(MetricTable::decode(&bytes).unwrap())
    }

    #[test]
    fn test_cmr10_at_12pt() {
        let font = ScaledFont::physical(FontKey::new("cmr10").at(Dimen::pt(12)), cmr_like()).unwrap();
        assert_eq!(font.get_scale_factor(), 1200);
        assert_eq!(font.get_em(), Dimen(786434));
        assert_eq!(font.get_ex(), Dimen(338602));
        assert_eq!(font.get_design_size(), Dimen::pt(10));
        assert_eq!(font.get_actual_size(), Dimen::pt(12));
        assert_eq!(font.get_checksum(), 0x4bf1_6079);
        assert_eq!(font.get_font_dimen(6), Some(font.get_em()));
        assert_eq!(font.get_font_dimen(0), None);
        assert_eq!(font.get_font_dimen(8), None);
    }

    #[test]
    fn test_scale_selects_size() {
        let font = ScaledFont::physical(FontKey::new("cmr10").scaled(1500), cmr_like()).unwrap();
        assert_eq!(font.get_actual_size(), Dimen::pt(15));
        assert_eq!(font.get_scale_factor(), 1500);
        assert_eq!(font.actual_font_key(), &FontKey::new("cmr10").at(Dimen::pt(15)));
        assert_eq!(font.font_key().scale(), Some(1500));
    }

    #[test]
    fn test_explicit_size_beats_scale() {
        let key = FontKey::new("cmr10").at(Dimen::pt(12)).scaled(2000);
        let font = ScaledFont::physical(key, cmr_like()).unwrap();
        assert_eq!(font.get_actual_size(), Dimen::pt(12));
        assert_eq!(font.actual_font_key().scale(), None);
    }

    #[test]
    fn test_design_size_by_default() {
        let font = ScaledFont::physical(FontKey::new("cmr10"), cmr_like()).unwrap();
        assert_eq!(font.get_actual_size(), Dimen::pt(10));
        assert_eq!(font.get_scale_factor(), 1000);
        assert_eq!(design_size(10), font.metrics().design_size());
    }

    #[test]
    fn test_invalid_sizes() {
        let too_big = FontKey::new("cmr10").at(Dimen::pt(2048));
        assert!(matches!(
            ScaledFont::physical(too_big, cmr_like()),
            Err(FontError::InvalidSize(_))
        ));
        for scale in [i64::MAX / 1000, i64::MAX, i64::MIN] {
            assert_eq!(
                ScaledFont::physical(FontKey::new("cmr10").scaled(scale), cmr_like()).err(),
                Some(FontError::InvalidSize(Dimen(i32::MAX)))
            );
        }
        let zero = FontKey::new("cmr10").scaled(0);
        assert_eq!(
            ScaledFont::physical(zero, cmr_like()).err(),
            Some(FontError::InvalidSize(Dimen::ZERO))
        );
    }

    #[test]
    fn test_queries_outside_range_are_absent() {
        let font = ScaledFont::physical(FontKey::new("cmr10"), cmr_like()).unwrap();
        for code in [0, u32::from(b'A') - 1, u32::from(b'V') + 1, 0xFFFF] {
            assert!(!font.has_glyph(code));
            assert_eq!(font.get_width(code), None);
            assert_eq!(font.get_height(code), None);
            assert_eq!(font.get_depth(code), None);
            assert_eq!(font.get_italic_correction(code), None);
        }
        // in range but not in the font
        assert!(!font.has_glyph(u32::from(b'B')));
        assert_eq!(font.get_width(u32::from(b'B')), Some(Dimen::ZERO));
    }

    #[test]
    fn test_kerning_defaults_to_zero() {
        let font = ScaledFont::physical(FontKey::new("cmr10"), cmr_like()).unwrap();
        let a = u32::from(b'A');
        let v = u32::from(b'V');
        assert!(font.get_kerning(a, v) < Dimen::ZERO);
        assert_eq!(font.get_kerning(v, a), Dimen::ZERO);
        assert_eq!(font.get_kerning(a, 0xFFFF), Dimen::ZERO);
        assert!(font.get_italic_correction(v).unwrap() > Dimen::ZERO);
    }

    #[test]
    fn test_widths_scale_linearly() {
        let metrics = cmr_like();
        let at10 = ScaledFont::physical(FontKey::new("cmr10").at(Dimen::pt(10)), metrics.clone()).unwrap();
        let at20 = ScaledFont::physical(FontKey::new("cmr10").at(Dimen::pt(20)), metrics).unwrap();
        let w10 = at10.get_width(u32::from(b'A')).unwrap().value();
        let w20 = at20.get_width(u32::from(b'A')).unwrap().value();
        assert!((w20 - 2 * w10).abs() <= 1);
    }
}
