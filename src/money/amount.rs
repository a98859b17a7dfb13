//! Money triples and display-unit rendering

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A monetary amount as `(amount, exponent, unit_code)`.
///
/// The value is `amount / 10^exponent` units of `unit_code`. Registry
/// indices publish amounts this way; a bare float is never accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: i64,
    #[serde(default, alias = "exp")]
    pub exponent: u32,
    #[serde(alias = "code")]
    pub unit_code: String,
}

impl Money {
    pub fn new(amount: i64, exponent: u32, unit_code: impl Into<String>) -> Self {
        Self {
            amount,
            exponent,
            unit_code: unit_code.into(),
        }
    }

    /// Unit code trimmed and upper-cased
    pub fn normalized_code(&self) -> String {
        self.unit_code.trim().to_ascii_uppercase()
    }

    /// Amount rescaled to a larger-or-equal exponent, exactly.
    ///
    /// Returns `None` when the target exponent is smaller (that would need
    /// rounding) or on overflow.
    pub fn scaled_to(&self, exponent: u32) -> Option<i128> {
        if exponent < self.exponent {
            return None;
        }
        let factor = 10i128.checked_pow(exponent - self.exponent)?;
        (self.amount as i128).checked_mul(factor)
    }

    /// Bring two amounts of the same unit onto a common exponent.
    pub fn common_scale(a: &Money, b: &Money) -> Option<(i128, i128, u32)> {
        if a.normalized_code() != b.normalized_code() {
            return None;
        }
        let exponent = a.exponent.max(b.exponent);
        Some((a.scaled_to(exponent)?, b.scaled_to(exponent)?, exponent))
    }

    /// Display rendering in its own unit
    pub fn display(&self) -> String {
        format_scaled(self.amount as i128, self.exponent)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.display(), self.normalized_code())
    }
}

/// The unit used when rendering smallest-unit ledger amounts for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayUnit {
    pub code: String,
    pub exponent: u32,
}

impl DisplayUnit {
    pub fn new(code: impl Into<String>, exponent: u32) -> Self {
        Self {
            code: code.into(),
            exponent,
        }
    }

    /// Render a smallest-unit amount with every fractional digit kept.
    pub fn format(&self, amount: i64) -> String {
        format_scaled(amount as i128, self.exponent)
    }

    /// Render an optional amount, `None` stays `None`.
    pub fn format_opt(&self, amount: Option<i64>) -> Option<String> {
        amount.map(|a| self.format(a))
    }

    /// Render a widened sum
    pub fn format_wide(&self, amount: i128) -> String {
        format_scaled(amount, self.exponent)
    }
}

impl Default for DisplayUnit {
    fn default() -> Self {
        Self::new("ADA", 6)
    }
}

fn format_scaled(amount: i128, exponent: u32) -> String {
    if exponent == 0 {
        return amount.to_string();
    }
    let Some(divisor) = 10u128.checked_pow(exponent) else {
        return format!("{}e-{}", amount, exponent);
    };
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        magnitude / divisor,
        magnitude % divisor,
        width = exponent as usize
    )
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer amount as a number or string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        v.trim()
            .parse::<i64>()
            .map_err(|e| E::custom(format!("invalid amount '{}': {}", v, e)))
    }
}

/// Accept integer amounts encoded either as JSON numbers or strings.
pub(crate) fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

/// Optional variant of [`deserialize_amount`]; `null` and `""` read as `None`.
pub(crate) fn deserialize_opt_amount<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(v)) => Ok(Some(v)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid amount '{}': {}", s, e))),
    }
}
