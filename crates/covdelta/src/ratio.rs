//! Exact decimal numbers for line-rates, deltas and thresholds
//!
//! Coverage tools write line-rates with varying precision (`0.8`, `0.80`,
//! `0.8333333333333334`). Comparing them through `f64` can flip a result that
//! sits exactly on a threshold, so every value is kept as an integer mantissa
//! with a decimal scale and compared after aligning scales.

use crate::{CoverageError, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Neg, Sub};
use std::str::FromStr;

/// Maximum number of fractional digits kept
pub const MAX_SCALE: u32 = 18;

/// Maximum number of integer digits accepted
const MAX_INTEGER_DIGITS: usize = 18;

/// Decimal value `mantissa / 10^scale`
///
/// The scale is preserved as written so `0.80` displays as `0.80`, while
/// equality and ordering compare numeric value (`0.8 == 0.80`).
#[derive(Debug, Clone, Copy)]
pub struct Ratio {
    mantissa: i128,
    scale: u32,
}

impl Ratio {
    pub const ZERO: Ratio = Ratio {
        mantissa: 0,
        scale: 0,
    };

    pub const ONE: Ratio = Ratio {
        mantissa: 1,
        scale: 0,
    };

    /// Value with two fractional digits, `hundredths(80)` is `0.80`
    pub const fn hundredths(value: i64) -> Self {
        Self {
            mantissa: value as i128,
            scale: 2,
        }
    }

    /// Parse a decimal such as `0.92`, `.5`, `1`, `-0.05`, `+0.10` or `5.0E-4`
    ///
    /// An exponent shifts the scale, so `1e-05` is exactly `0.00001`.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| CoverageError::InvalidRatio {
            value: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (number, exponent) = match unsigned.split_once(['e', 'E']) {
            Some((number, exponent)) => {
                let exponent =
                    parse_exponent(exponent).ok_or_else(|| invalid("malformed exponent"))?;
                (number, exponent)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("no digits"));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("expected a decimal number"));
        }

        let mut digits = format!("{}{}", int_part, frac_part);
        let mut scale = frac_part.len() as i64 - exponent;
        if scale < 0 {
            let shift = usize::try_from(-scale).map_err(|_| invalid("exponent out of range"))?;
            if shift > MAX_INTEGER_DIGITS {
                return Err(invalid("too many integer digits"));
            }
            digits.push_str(&"0".repeat(shift));
            scale = 0;
        }

        // Trailing zeros beyond the supported scale carry no value.
        while scale > i64::from(MAX_SCALE) && digits.ends_with('0') {
            digits.pop();
            scale -= 1;
        }
        if scale > i64::from(MAX_SCALE) {
            return Err(invalid("too many fractional digits"));
        }
        let scale = scale as u32;

        let significant = digits.trim_start_matches('0');
        if significant.len() > scale as usize + MAX_INTEGER_DIGITS {
            return Err(invalid("too many integer digits"));
        }

        let mantissa = significant
            .bytes()
            .fold(0i128, |acc, b| acc * 10 + i128::from(b - b'0'));

        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }

    /// Number of fractional digits as written
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn is_positive(&self) -> bool {
        self.mantissa > 0
    }

    /// Whether the value lies in `[0, 1]`
    pub fn is_unit_interval(&self) -> bool {
        *self >= Self::ZERO && *self <= Self::ONE
    }

    /// Same value multiplied by 100, without rounding
    pub fn to_percent(self) -> Ratio {
        if self.scale >= 2 {
            Ratio {
                mantissa: self.mantissa,
                scale: self.scale - 2,
            }
        } else {
            Ratio {
                mantissa: self.mantissa * 10i128.pow(2 - self.scale),
                scale: 0,
            }
        }
    }

    /// Absolute value
    pub fn abs(self) -> Ratio {
        Ratio {
            mantissa: self.mantissa.abs(),
            scale: self.scale,
        }
    }

    fn rescaled(&self, scale: u32) -> i128 {
        self.mantissa * 10i128.pow(scale - self.scale)
    }
}

/// Signed decimal exponent of at most four digits
fn parse_exponent(text: &str) -> Option<i64> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ratio {}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.rescaled(scale).cmp(&other.rescaled(scale))
    }
}

impl Sub for Ratio {
    type Output = Ratio;

    fn sub(self, other: Ratio) -> Ratio {
        let scale = self.scale.max(other.scale);
        Ratio {
            mantissa: self.rescaled(scale) - other.rescaled(scale),
            scale,
        }
    }
}

impl Neg for Ratio {
    type Output = Ratio;

    fn neg(self) -> Ratio {
        Ratio {
            mantissa: -self.mantissa,
            scale: self.scale,
        }
    }
}

impl FromStr for Ratio {
    type Err = CoverageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 {
            "-"
        } else if f.sign_plus() {
            "+"
        } else {
            ""
        };
        let abs = self.mantissa.unsigned_abs();

        if self.scale == 0 {
            write!(f, "{}{}", sign, abs)
        } else {
            let divisor = 10u128.pow(self.scale);
            write!(
                f,
                "{}{}.{:0width$}",
                sign,
                abs / divisor,
                abs % divisor,
                width = self.scale as usize
            )
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(RatioVisitor)
    }
}

struct RatioVisitor;

impl Visitor<'_> for RatioVisitor {
    type Value = Ratio;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or a decimal string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Ratio, E> {
        Ratio::parse(v).map_err(E::custom)
    }

    // `f64` Display never uses exponent notation and prints the shortest
    // round-tripping digits, so `0.8` stays `0.8`.
    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Ratio, E> {
        if !v.is_finite() {
            return Err(E::custom("ratio must be finite"));
        }
        Ratio::parse(&v.to_string()).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Ratio, E> {
        Ok(Ratio {
            mantissa: i128::from(v),
            scale: 0,
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Ratio, E> {
        Ok(Ratio {
            mantissa: i128::from(v),
            scale: 0,
        })
    }
}
