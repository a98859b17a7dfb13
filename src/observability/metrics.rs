//! Run counters
//!
//! Counters only, monotonic within a process. Relaxed atomics: the rayon
//! workers bump them concurrently and nobody reads them mid-run.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    periods_reconciled: AtomicU64,
    periods_degraded: AtomicU64,
    tolerance_signals: AtomicU64,
    series_gaps: AtomicU64,
    rows_rejected: AtomicU64,
    flags_emitted: AtomicU64,
    flags_cleared: AtomicU64,
    flags_reopened: AtomicU64,
    links_high: AtomicU64,
    links_medium: AtomicU64,
    links_low: AtomicU64,
    links_ambiguous: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $add:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        pub fn $add(&self, n: u64) {
            self.$field.fetch_add(n, Ordering::Relaxed);
        }
    };
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(increment_periods_reconciled, add_periods_reconciled, periods_reconciled);
    counter!(increment_periods_degraded, add_periods_degraded, periods_degraded);
    counter!(increment_tolerance_signals, add_tolerance_signals, tolerance_signals);
    counter!(increment_series_gaps, add_series_gaps, series_gaps);
    counter!(increment_rows_rejected, add_rows_rejected, rows_rejected);
    counter!(increment_flags_emitted, add_flags_emitted, flags_emitted);
    counter!(increment_flags_cleared, add_flags_cleared, flags_cleared);
    counter!(increment_flags_reopened, add_flags_reopened, flags_reopened);
    counter!(increment_links_high, add_links_high, links_high);
    counter!(increment_links_medium, add_links_medium, links_medium);
    counter!(increment_links_low, add_links_low, links_low);
    counter!(increment_links_ambiguous, add_links_ambiguous, links_ambiguous);

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            periods_reconciled: load(&self.periods_reconciled),
            periods_degraded: load(&self.periods_degraded),
            tolerance_signals: load(&self.tolerance_signals),
            series_gaps: load(&self.series_gaps),
            rows_rejected: load(&self.rows_rejected),
            flags_emitted: load(&self.flags_emitted),
            flags_cleared: load(&self.flags_cleared),
            flags_reopened: load(&self.flags_reopened),
            links_high: load(&self.links_high),
            links_medium: load(&self.links_medium),
            links_low: load(&self.links_low),
            links_ambiguous: load(&self.links_ambiguous),
        }
    }
}

/// Serializable copy of the registry, published in `status.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub periods_reconciled: u64,
    pub periods_degraded: u64,
    pub tolerance_signals: u64,
    pub series_gaps: u64,
    pub rows_rejected: u64,
    pub flags_emitted: u64,
    pub flags_cleared: u64,
    pub flags_reopened: u64,
    pub links_high: u64,
    pub links_medium: u64,
    pub links_low: u64,
    pub links_ambiguous: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let m = MetricsRegistry::new();
        m.increment_periods_reconciled();
        m.add_periods_reconciled(4);
        m.increment_flags_cleared();
        m.add_links_low(2);

        let snap = m.snapshot();
        assert_eq!(snap.periods_reconciled, 5);
        assert_eq!(snap.flags_cleared, 1);
        assert_eq!(snap.links_low, 2);
        assert_eq!(snap.flags_emitted, 0);
    }

    #[test]
    fn test_concurrent_increments() {
        use rayon::prelude::*;

        let m = MetricsRegistry::new();
        (0..1000).into_par_iter().for_each(|_| m.increment_tolerance_signals());
        assert_eq!(m.snapshot().tolerance_signals, 1000);
    }

    #[test]
    fn test_snapshot_serializes_field_names() {
        let m = MetricsRegistry::new();
        m.increment_series_gaps();
        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["series_gaps"], 1);
    }
}
