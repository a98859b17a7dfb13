//! Recipient concentration and percentile thresholds
//!
//! All values are same-unit sums aligned to one exponent; nothing here
//! touches floating point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::linker::{EntityRecord, IndexKind, ScaledSum, TotalKind};
use crate::money::DisplayUnit;

/// Top-N cut-offs reported for every unit
pub const TOP_N: [usize; 4] = [10, 20, 50, 100];

const SHARE_DIGITS: u32 = 6;

/// Per-entity distributed totals in one unit, on a common exponent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSeries {
    pub unit_code: String,
    pub exponent: u32,
    /// `(entity_id, amount)` in entity-id order
    pub values: Vec<(String, i128)>,
}

impl UnitSeries {
    /// Distributed totals of every off-chain entity holding `unit_code`
    pub fn distributed(entities: &[EntityRecord], unit_code: &str) -> Self {
        let unit = unit_code.trim().to_ascii_uppercase();
        let sums: Vec<(String, ScaledSum)> = entities
            .iter()
            .filter(|e| e.index.kind == IndexKind::Offchain)
            .filter_map(|e| {
                e.total_in(TotalKind::Distributed, &unit)
                    .map(|s| (e.entity_id.clone(), s))
            })
            .collect();

        let exponent = sums.iter().map(|(_, s)| s.exponent).max().unwrap_or(0);
        let values = sums
            .into_iter()
            .filter_map(|(id, s)| {
                let factor = 10i128.checked_pow(exponent - s.exponent)?;
                Some((id, s.amount.checked_mul(factor)?))
            })
            .collect();

        Self {
            unit_code: unit,
            exponent,
            values,
        }
    }

    /// Positive values, ascending
    pub fn sorted_positive(&self) -> Vec<i128> {
        let mut v: Vec<i128> = self.values.iter().map(|(_, a)| *a).filter(|a| *a > 0).collect();
        v.sort_unstable();
        v
    }

    pub fn display(&self, amount: i128) -> String {
        DisplayUnit::new(self.unit_code.clone(), self.exponent).format_wide(amount)
    }
}

/// Nearest-rank-below percentile: the element at
/// `floor(pct / 100 × (n − 1))` of an ascending list.
pub fn percentile_threshold(sorted: &[i128], percentile: u32) -> Option<i128> {
    if sorted.is_empty() {
        return None;
    }
    let pct = percentile.min(100) as usize;
    let k = pct * (sorted.len() - 1) / 100;
    sorted.get(k).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeavyRecipientThreshold {
    pub unit_code: String,
    pub percentile: u32,
    /// `None` when no entity has a positive total in the unit
    pub threshold: Option<String>,
    pub recipients: u64,
}

/// The heavy-recipient cut-off over positive distributed totals
pub fn heavy_recipient_threshold(series: &UnitSeries, percentile: u32) -> Option<i128> {
    percentile_threshold(&series.sorted_positive(), percentile)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concentration {
    pub unit_code: String,
    pub recipients: u64,
    pub total_distributed: String,
    /// `top10` … `top100` → share of the total, six decimals, floored
    pub shares: BTreeMap<String, String>,
}

pub fn concentration(series: &UnitSeries) -> Concentration {
    let mut desc = series.sorted_positive();
    desc.reverse();
    let total: i128 = desc.iter().sum();

    let mut shares = BTreeMap::new();
    for n in TOP_N {
        let top: i128 = desc.iter().take(n).sum();
        shares.insert(format!("top{}", n), format_share(top, total));
    }

    Concentration {
        unit_code: series.unit_code.clone(),
        recipients: desc.len() as u64,
        total_distributed: series.display(total),
        shares,
    }
}

fn format_share(part: i128, whole: i128) -> String {
    let scale = 10i128.pow(SHARE_DIGITS);
    let scaled = if whole <= 0 {
        0
    } else {
        part.saturating_mul(scale) / whole
    };
    format!(
        "{}.{:0width$}",
        scaled / scale,
        scaled % scale,
        width = SHARE_DIGITS as usize
    )
}
