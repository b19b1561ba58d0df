//! The value types everything else is measured in
//!
//! [`FixWord`] is what the files store, [`Dimen`] is what callers get back,
//! and [`FontKey`] names a font instance.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One point in scaled points
pub const UNITY: i32 = 1 << 16;

/// A signed 32-bit fixed-point number with 20 fractional bits
///
/// The unit is relative: a width of `FixWord::ONE` is as wide as the size the
/// font is scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FixWord(pub i32);

impl FixWord {
    pub const ZERO: FixWord = FixWord(0);
    pub const ONE: FixWord = FixWord(1 << 20);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// The four bytes in file order
    pub const fn bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// True when the value lies in TeX's (-16, 16) range, i.e. the top byte is 0 or 255
    pub const fn is_in_range(self) -> bool {
        matches!(self.bytes()[0], 0 | 255)
    }
}

/// A length in scaled points (2^-16 pt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Dimen(pub i32);

impl Dimen {
    pub const ZERO: Dimen = Dimen(0);

    pub const fn sp(sp: i32) -> Self {
        Self(sp)
    }

    /// Whole points
    pub const fn pt(points: i32) -> Self {
        Self(points * UNITY)
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    pub fn max(self, other: Dimen) -> Dimen {
        Dimen(self.0.max(other.0))
    }
}

impl std::ops::Add for Dimen {
    type Output = Dimen;

    fn add(self, rhs: Dimen) -> Dimen {
        Dimen(self.0.wrapping_add(rhs.0))
    }
}

impl std::ops::AddAssign for Dimen {
    fn add_assign(&mut self, rhs: Dimen) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl std::ops::Sub for Dimen {
    type Output = Dimen;

    fn sub(self, rhs: Dimen) -> Dimen {
        Dimen(self.0.wrapping_sub(rhs.0))
    }
}

impl std::ops::Neg for Dimen {
    type Output = Dimen;

    fn neg(self) -> Dimen {
        Dimen(self.0.wrapping_neg())
    }
}

/// Prints the value the way TeX's `print_scaled` does, e.g. `2.3999pt`
impl fmt::Display for Dimen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = i64::from(self.0);
        if s < 0 {
            f.write_str("-")?;
            s = -s;
        }
        let unity = i64::from(UNITY);
        write!(f, "{}.", s / unity)?;
        s = 10 * (s % unity) + 5;
        let mut delta = 10;
        loop {
            if delta > unity {
                // round the last digit
                s += 0x8000 - 50000;
            }
            write!(f, "{}", s / unity)?;
            s = 10 * (s % unity);
            delta *= 10;
            if s <= delta {
                break;
            }
        }
        f.write_str("pt")
    }
}

/// Parses `<decimal>pt` (the unit may be omitted) with TeX's decimal rounding
impl FromStr for Dimen {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let number = s.strip_suffix("pt").unwrap_or(s).trim();
        let (negative, number) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(format!("not a dimension: {s:?}"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("not a dimension: {s:?}"));
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| format!("not a dimension: {s:?}"))?
        };
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("not a dimension: {s:?}"));
        }
        // round_decimals: only the first 17 digits can matter
        let mut a: i64 = 0;
        for digit in frac.bytes().take(17).rev() {
            a = (a + i64::from(digit - b'0') * (1 << 17)) / 10;
        }
        let fraction = (a + 1) / 2;
        let total = whole
            .checked_mul(i64::from(UNITY))
            .and_then(|t| t.checked_add(fraction))
            .filter(|&t| t < 1 << 30)
            .ok_or_else(|| format!("dimension too large: {s:?}"))?;
        let total = total as i32;
        Ok(Dimen(if negative { -total } else { total }))
    }
}

/// Name of the parameter holding a scale in parts per thousand
pub const SCALE: &str = "SCALE";

/// Identifies a font instance: file name, optional size, extra parameters
///
/// Equality and hashing are structural. Parameters live in an ordered map,
/// so the order they were added in never matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    name: String,
    size: Option<Dimen>,
    params: BTreeMap<String, i64>,
}

impl FontKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            params: BTreeMap::new(),
        }
    }

    /// Request the font at an explicit size, overriding its design size
    pub fn at(mut self, size: Dimen) -> Self {
        self.size = Some(size);
        self
    }

    /// Request the font scaled by `scale / 1000` of its design size
    pub fn scaled(self, scale: i64) -> Self {
        self.with_param(SCALE, scale)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: i64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Option<Dimen> {
        self.size
    }

    pub fn params(&self) -> &BTreeMap<String, i64> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<i64> {
        self.params.get(name).copied()
    }

    pub fn scale(&self) -> Option<i64> {
        self.param(SCALE)
    }

    /// The same key without the `SCALE` entry
    pub(crate) fn without_scale(&self) -> Self {
        let mut key = self.clone();
        key.params.remove(SCALE);
        key
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(size) = self.size {
            write!(f, " at {size}")?;
        }
        for (name, value) in &self.params {
            if name == SCALE {
                write!(f, " scaled {value}")?;
            } else {
                write!(f, " {name}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_scaled_matches_tex() {
        assert_eq!(Dimen::pt(12).to_string(), "12.0pt");
        assert_eq!(Dimen::sp(157280).to_string(), "2.3999pt");
        assert_eq!(Dimen::sp(-32768).to_string(), "-0.5pt");
        assert_eq!(Dimen::sp(1).to_string(), "0.00002pt");
    }

    #[test]
    fn test_parse_rounds_like_tex() {
        assert_eq!("12pt".parse::<Dimen>(), Ok(Dimen::pt(12)));
        assert_eq!("0.5pt".parse::<Dimen>(), Ok(Dimen::sp(32768)));
        assert_eq!("-1.5".parse::<Dimen>(), Ok(Dimen::sp(-98304)));
        assert_eq!("2.399904pt".parse::<Dimen>(), Ok(Dimen::sp(157280)));
        assert!("pt".parse::<Dimen>().is_err());
        assert!("1.2e3pt".parse::<Dimen>().is_err());
        assert!("--5pt".parse::<Dimen>().is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_dimensions() {
        assert!("16383.99999pt".parse::<Dimen>().is_ok());
        for text in ["16384pt", "1000000000000000pt", "99999999999999999999pt"] {
            let err = text.parse::<Dimen>().unwrap_err();
            assert!(err.contains("too large") || err.contains("not a dimension"), "{text}: {err}");
        }
        assert_eq!(
            "1000000000000000pt".parse::<Dimen>(),
            Err("dimension too large: \"1000000000000000pt\"".to_string())
        );
    }

    #[test]
    fn test_font_key_params_are_order_independent() {
        let a = FontKey::new("cmr10").with_param("A", 1).with_param("B", 2);
        let b = FontKey::new("cmr10").with_param("B", 2).with_param("A", 1);
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let hash = |k: &FontKey| {
            let mut h = DefaultHasher::new();
            k.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_font_key_display() {
        let key = FontKey::new("cmr10").scaled(1200);
        assert_eq!(key.to_string(), "cmr10 scaled 1200");
        let key = FontKey::new("cmr10").at(Dimen::pt(12));
        assert_eq!(key.to_string(), "cmr10 at 12.0pt");
    }
}
