//! Calendar-year aggregates
//!
//! Flow fields are summed. Balances are never averaged: the opening balance
//! comes from the first contained period and the closing balance from the
//! last. Estimate sums carry the number of periods that contributed, so a
//! year with degraded periods is visibly incomplete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::completeness::{partial_reasons, period_year, PartialReason};
use crate::money::DisplayUnit;
use crate::reconcile::ReconciledRecord;
use crate::snapshot::{FlowKind, PeriodId, SeriesGap};

/// A sum over the periods that had a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountedSum {
    /// `None` when no period contributed
    pub total: Option<i128>,
    pub periods: u64,
}

impl CountedSum {
    fn add(&mut self, value: Option<i64>) {
        if let Some(v) = value {
            self.total = Some(self.total.unwrap_or(0) + v as i128);
            self.periods += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearAggregate {
    pub year: i32,
    pub periods: u64,
    pub first_period_id: PeriodId,
    pub last_period_id: PeriodId,

    pub fees: i128,
    pub monetary_expansion_est: CountedSum,
    pub inflow_est: CountedSum,
    pub treasury_delta: CountedSum,
    pub implied_outflow_other: CountedSum,
    pub explicit_outflow: i128,
    pub explicit_inflow_other: i128,
    pub explicit_by_kind: BTreeMap<FlowKind, i128>,
    pub withdrawals: i128,

    pub treasury_balance_start: Option<i64>,
    pub treasury_balance_end: i64,
    pub reserves_balance_start: Option<i64>,

    /// Periods whose estimate is null
    pub degraded_periods: u64,
    /// Periods marked for review by the tolerance policy
    pub review_periods: u64,

    /// Empty for a fully covered year
    pub partial: Vec<PartialReason>,
    /// Series gaps that border a period of this year
    pub gap_warnings: Vec<SeriesGap>,

    pub display: BTreeMap<String, Option<String>>,
}

impl YearAggregate {
    pub fn is_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    fn from_records(year: i32, records: &[&ReconciledRecord]) -> Option<Self> {
        let first = records.first()?;
        let last = records.last()?;

        let mut agg = YearAggregate {
            year,
            periods: records.len() as u64,
            first_period_id: first.period_id(),
            last_period_id: last.period_id(),
            fees: 0,
            monetary_expansion_est: CountedSum::default(),
            inflow_est: CountedSum::default(),
            treasury_delta: CountedSum::default(),
            implied_outflow_other: CountedSum::default(),
            explicit_outflow: 0,
            explicit_inflow_other: 0,
            explicit_by_kind: BTreeMap::new(),
            withdrawals: 0,
            treasury_balance_start: first.snapshot.treasury_balance_start,
            treasury_balance_end: last.snapshot.treasury_balance_end,
            reserves_balance_start: first.snapshot.reserves_balance_start,
            degraded_periods: 0,
            review_periods: 0,
            partial: Vec::new(),
            gap_warnings: Vec::new(),
            display: BTreeMap::new(),
        };

        for record in records {
            agg.fees += record.snapshot.fees as i128;
            agg.monetary_expansion_est.add(record.monetary_expansion_est);
            agg.inflow_est.add(record.inflow_est);
            agg.treasury_delta.add(record.treasury_delta);
            agg.implied_outflow_other.add(record.implied_outflow_other);
            agg.explicit_outflow += record.explicit_outflow as i128;
            agg.explicit_inflow_other += record.explicit_inflow_other as i128;
            agg.withdrawals += record.withdrawals as i128;
            for (kind, amount) in &record.explicit_by_kind {
                *agg.explicit_by_kind.entry(*kind).or_insert(0) += *amount as i128;
            }
            if record.degraded.is_some() {
                agg.degraded_periods += 1;
            }
            if record.tolerance.needs_review() {
                agg.review_periods += 1;
            }
        }

        Some(agg)
    }

    fn render_display(&mut self, unit: &DisplayUnit) {
        let wide = |v: i128| Some(unit.format_wide(v));
        let counted = |c: &CountedSum| c.total.map(|v| unit.format_wide(v));

        let mut display = BTreeMap::new();
        display.insert("fees".to_string(), wide(self.fees));
        display.insert(
            "monetary_expansion_est".to_string(),
            counted(&self.monetary_expansion_est),
        );
        display.insert("inflow_est".to_string(), counted(&self.inflow_est));
        display.insert("treasury_delta".to_string(), counted(&self.treasury_delta));
        display.insert(
            "implied_outflow_other".to_string(),
            counted(&self.implied_outflow_other),
        );
        display.insert("explicit_outflow".to_string(), wide(self.explicit_outflow));
        display.insert(
            "explicit_inflow_other".to_string(),
            wide(self.explicit_inflow_other),
        );
        display.insert("withdrawals".to_string(), wide(self.withdrawals));
        display.insert(
            "treasury_balance_start".to_string(),
            unit.format_opt(self.treasury_balance_start),
        );
        display.insert(
            "treasury_balance_end".to_string(),
            Some(unit.format(self.treasury_balance_end)),
        );
        display.insert(
            "reserves_balance_start".to_string(),
            unit.format_opt(self.reserves_balance_start),
        );
        for (kind, amount) in &self.explicit_by_kind {
            display.insert(format!("explicit.{}", kind.as_str()), wide(*amount));
        }
        self.display = display;
    }
}

/// Roll period records into calendar-year aggregates, ordered by year.
///
/// Records are expected in period order, as the reconciliation engine
/// returns them.
pub fn aggregate_years(
    records: &[ReconciledRecord],
    gaps: &[SeriesGap],
    unit: &DisplayUnit,
) -> Vec<YearAggregate> {
    let mut by_year: BTreeMap<i32, Vec<&ReconciledRecord>> = BTreeMap::new();
    for record in records {
        by_year.entry(period_year(record)).or_default().push(record);
    }

    let first_year = by_year.keys().next().copied();
    let last_year = by_year.keys().next_back().copied();

    let mut years = Vec::with_capacity(by_year.len());
    for (year, members) in &by_year {
        let Some(mut agg) = YearAggregate::from_records(*year, members) else {
            continue;
        };
        agg.partial = partial_reasons(
            *year,
            members,
            Some(*year) == first_year,
            Some(*year) == last_year,
        );
        agg.gap_warnings = gaps
            .iter()
            .filter(|gap| {
                members
                    .iter()
                    .any(|r| r.period_id() == gap.after || r.period_id() == gap.before)
            })
            .copied()
            .collect();
        agg.render_display(unit);
        years.push(agg);
    }
    years
}
