//! Fund summaries and yearly distributions from the off-chain registry

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::linker::{EntityRecord, IndexKind, ProjectStatus, ScaledSum};
use crate::money::{DisplayUnit, Money};

/// Running per-unit sums
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UnitTotals(BTreeMap<String, ScaledSum>);

impl UnitTotals {
    pub(crate) fn add(&mut self, money: &Money) {
        let unit = money.normalized_code();
        let value = ScaledSum {
            amount: money.amount as i128,
            exponent: money.exponent,
        };
        let next = match self.0.get(&unit) {
            // an overflowing unit keeps its last good sum
            Some(prev) => prev.checked_add(value).unwrap_or(*prev),
            None => value,
        };
        self.0.insert(unit, next);
    }

    pub(crate) fn render(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(unit, sum)| {
                let rendered = DisplayUnit::new(unit.clone(), sum.exponent).format_wide(sum.amount);
                (unit.clone(), rendered)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundSummary {
    pub fund_id: String,
    pub projects: u64,
    pub proposers: u64,
    pub completed_projects: u64,
    /// completed / projects, three decimals, floored
    pub completion_rate: String,
    pub distributed: BTreeMap<String, String>,
    pub requested: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyDistribution {
    /// Year of the project's last update; a proxy for payment time
    pub year: i32,
    pub projects: u64,
    pub distributed: BTreeMap<String, String>,
}

#[derive(Default)]
struct FundAcc {
    projects: u64,
    proposers: BTreeSet<String>,
    completed: u64,
    distributed: UnitTotals,
    requested: UnitTotals,
}

fn offchain(entities: &[EntityRecord]) -> impl Iterator<Item = &EntityRecord> {
    entities.iter().filter(|e| e.index.kind == IndexKind::Offchain)
}

/// Per-fund rollup, ordered by fund id (numeric ids numerically)
pub fn fund_summaries(entities: &[EntityRecord]) -> Vec<FundSummary> {
    let mut funds: BTreeMap<String, FundAcc> = BTreeMap::new();
    for entity in offchain(entities) {
        for project in &entity.projects {
            let Some(fund_id) = project.fund_id.as_deref().map(str::trim).filter(|f| !f.is_empty())
            else {
                continue;
            };
            let acc = funds.entry(fund_id.to_string()).or_default();
            acc.projects += 1;
            acc.proposers.insert(entity.entity_id.clone());
            if project.status == ProjectStatus::Completed {
                acc.completed += 1;
            }
            if let Some(m) = &project.distributed {
                acc.distributed.add(m);
            }
            if let Some(m) = &project.requested {
                acc.requested.add(m);
            }
        }
    }

    let mut rows: Vec<FundSummary> = funds
        .into_iter()
        .map(|(fund_id, acc)| FundSummary {
            completion_rate: ratio_3(acc.completed, acc.projects),
            fund_id,
            projects: acc.projects,
            proposers: acc.proposers.len() as u64,
            completed_projects: acc.completed,
            distributed: acc.distributed.render(),
            requested: acc.requested.render(),
        })
        .collect();
    rows.sort_by(|a, b| fund_order(&a.fund_id).cmp(&fund_order(&b.fund_id)));
    rows
}

fn fund_order(id: &str) -> (u8, u64, String) {
    match id.parse::<u64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, id.to_string()),
    }
}

fn ratio_3(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0.000".to_string();
    }
    let scaled = part as u128 * 1000 / whole as u128;
    format!("{}.{:03}", scaled / 1000, scaled % 1000)
}

/// Distributed amounts bucketed by the year of each project's `updated_at`.
/// Projects without a timestamp are skipped.
pub fn yearly_distributions(entities: &[EntityRecord]) -> Vec<YearlyDistribution> {
    let mut years: BTreeMap<i32, (u64, UnitTotals)> = BTreeMap::new();
    for entity in offchain(entities) {
        for project in &entity.projects {
            let Some(updated) = project.updated_at else {
                continue;
            };
            let (count, totals) = years.entry(updated.year()).or_default();
            *count += 1;
            if let Some(m) = &project.distributed {
                totals.add(m);
            }
        }
    }
    years
        .into_iter()
        .map(|(year, (projects, totals))| YearlyDistribution {
            year,
            projects,
            distributed: totals.render(),
        })
        .collect()
}
