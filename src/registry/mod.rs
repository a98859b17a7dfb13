//! Off-chain registry analytics
//!
//! Fund summaries, yearly distributions, recipient concentration and the
//! heavy-recipient threshold. Context for the flags, never evidence on its
//! own.

mod concentration;
mod summary;

pub use concentration::{
    concentration, heavy_recipient_threshold, percentile_threshold, Concentration,
    HeavyRecipientThreshold, UnitSeries, TOP_N,
};
pub use summary::{fund_summaries, yearly_distributions, FundSummary, YearlyDistribution};

use serde::{Deserialize, Serialize};

use crate::linker::EntityRecord;

/// Everything published in `registry.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryReport {
    pub proposers: u64,
    pub funds: Vec<FundSummary>,
    pub yearly: Vec<YearlyDistribution>,
    pub concentration: Vec<Concentration>,
    pub heavy_recipient: HeavyRecipientThreshold,
}

/// Build the registry report over the off-chain entities.
///
/// `units` selects the concentration views; the heavy-recipient threshold
/// is computed in `heavy_unit` at `percentile`.
pub fn registry_report(
    entities: &[EntityRecord],
    units: &[String],
    heavy_unit: &str,
    percentile: u32,
) -> RegistryReport {
    let proposers = entities
        .iter()
        .filter(|e| e.index.kind == crate::linker::IndexKind::Offchain)
        .count() as u64;

    let concentration = units
        .iter()
        .map(|u| concentration(&UnitSeries::distributed(entities, u)))
        .collect();

    let heavy_series = UnitSeries::distributed(entities, heavy_unit);
    let threshold = heavy_recipient_threshold(&heavy_series, percentile);
    let recipients = match threshold {
        Some(t) => heavy_series
            .values
            .iter()
            .filter(|(_, v)| *v > 0 && *v >= t)
            .count() as u64,
        None => 0,
    };

    RegistryReport {
        proposers,
        funds: fund_summaries(entities),
        yearly: yearly_distributions(entities),
        concentration,
        heavy_recipient: HeavyRecipientThreshold {
            unit_code: heavy_series.unit_code.clone(),
            percentile,
            threshold: threshold.map(|t| heavy_series.display(t)),
            recipients,
        },
    }
}
