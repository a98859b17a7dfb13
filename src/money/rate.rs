//! Decimal rational rates (ρ, τ, tolerance ratios)
//!
//! A rate is stored as `numerator / denominator` where the denominator is a
//! power of ten taken from the decimal text. `0.003` is `3 / 1000`.
//!
//! JSON inputs may carry rates as strings (`"0.003"`) or numbers (`0.003`).
//! Numbers go through their shortest round-trip decimal rendering, so `0.003`
//! parses to exactly `3 / 1000` and not the nearest binary fraction.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest number of fractional digits accepted (10^18 fits in u64)
const MAX_FRACTION_DIGITS: usize = 18;

/// Rate parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateParseError {
    #[error("empty rate")]
    Empty,

    #[error("invalid rate literal: {0}")]
    InvalidLiteral(String),

    #[error("rate has more than 18 fractional digits: {0}")]
    TooPrecise(String),

    #[error("rate denominator must be non-zero")]
    ZeroDenominator,
}

/// An exact decimal rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rate {
    numerator: i64,
    denominator: u64,
}

impl Rate {
    /// Zero rate
    pub const ZERO: Rate = Rate {
        numerator: 0,
        denominator: 1,
    };

    /// `p / 100`
    pub const fn percent(p: i64) -> Self {
        Self::trimmed(p, 100)
    }

    /// Drop common factors of ten so equal decimals compare equal
    const fn trimmed(mut numerator: i64, mut denominator: u64) -> Self {
        while denominator > 1 && denominator % 10 == 0 && numerator % 10 == 0 {
            numerator /= 10;
            denominator /= 10;
        }
        Self {
            numerator,
            denominator,
        }
    }

    /// Build a rate from raw parts.
    pub fn new(numerator: i64, denominator: u64) -> Result<Self, RateParseError> {
        if denominator == 0 {
            return Err(RateParseError::ZeroDenominator);
        }
        Ok(Self::trimmed(numerator, denominator))
    }

    /// Parse a decimal literal such as `0.003`, `-0.5` or `1`.
    pub fn parse(text: &str) -> Result<Self, RateParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RateParseError::Empty);
        }

        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(RateParseError::InvalidLiteral(text.to_string()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(RateParseError::InvalidLiteral(text.to_string()));
        }

        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.len() > MAX_FRACTION_DIGITS {
            return Err(RateParseError::TooPrecise(text.to_string()));
        }

        let denominator = 10u64.pow(frac_part.len() as u32);
        let digits = format!("{}{}", int_part, frac_part);
        let magnitude: i64 = if digits.trim_start_matches('0').is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|_| RateParseError::InvalidLiteral(text.to_string()))?
        };

        Ok(Self {
            numerator: if negative { -magnitude } else { magnitude },
            denominator,
        })
    }

    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// True when `0 <= self <= 1`.
    pub fn is_unit_interval(&self) -> bool {
        self.numerator >= 0 && (self.numerator as u64) <= self.denominator
    }

    /// True when strictly positive.
    pub fn is_positive(&self) -> bool {
        self.numerator > 0
    }

    /// `floor(value * self)` in exact arithmetic.
    ///
    /// Returns `None` on i128 overflow.
    pub fn mul_floor(&self, value: i128) -> Option<i128> {
        let product = value.checked_mul(self.numerator as i128)?;
        Some(product.div_euclid(self.denominator as i128))
    }

    /// True when `part / whole > self`, compared by cross-multiplication.
    ///
    /// Both sides must be non-negative magnitudes. A negative rate is
    /// exceeded by every non-negative ratio.
    pub fn is_exceeded_by(&self, part: u128, whole: u128) -> bool {
        if self.numerator < 0 {
            return true;
        }
        let lhs = part.saturating_mul(self.denominator as u128);
        let rhs = whole.saturating_mul(self.numerator as u128);
        lhs > rhs
    }

    /// True when `part / whole >= self`.
    pub fn is_reached_by(&self, part: u128, whole: u128) -> bool {
        if self.numerator < 0 {
            return true;
        }
        let lhs = part.saturating_mul(self.denominator as u128);
        let rhs = whole.saturating_mul(self.numerator as u128);
        lhs >= rhs
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scale = 0usize;
        let mut d = self.denominator;
        while d > 1 && d % 10 == 0 {
            d /= 10;
            scale += 1;
        }
        if d != 1 {
            return write!(f, "{}/{}", self.numerator, self.denominator);
        }

        let sign = if self.numerator < 0 { "-" } else { "" };
        let magnitude = self.numerator.unsigned_abs();
        if scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let int_part = magnitude / self.denominator;
        let frac_part = magnitude % self.denominator;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            int_part,
            frac_part,
            width = scale
        )
    }
}

impl std::str::FromStr for Rate {
    type Err = RateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rate::parse(s)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct RateVisitor;

impl<'de> Visitor<'de> for RateVisitor {
    type Value = Rate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal rate as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Rate, E> {
        Rate::parse(v).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Rate, E> {
        if !v.is_finite() {
            return Err(E::custom("rate must be finite"));
        }
        Rate::parse(&v.to_string()).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Rate, E> {
        let numerator = i64::try_from(v).map_err(E::custom)?;
        Ok(Rate {
            numerator,
            denominator: 1,
        })
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Rate, E> {
        Ok(Rate {
            numerator: v,
            denominator: 1,
        })
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RateVisitor)
    }
}
