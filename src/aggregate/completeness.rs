//! Partial-year labeling

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::reconcile::ReconciledRecord;

/// Why a calendar year is not fully covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialReason {
    /// Latest year; its last period ends before the year does
    Accumulating,
    /// First year; an earlier period of the same length would still fall in it
    SeriesStart,
}

fn year_start(year: i32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()
}

/// Labels for one year's records.
///
/// `is_first`/`is_last` say whether this is the first/last year of the
/// series; only those can be partial.
pub(crate) fn partial_reasons(
    year: i32,
    records: &[&ReconciledRecord],
    is_first: bool,
    is_last: bool,
) -> Vec<PartialReason> {
    let mut reasons = Vec::new();
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return reasons;
    };

    if is_first {
        let first_snap = &first.snapshot;
        let length = first_snap.end_time - first_snap.start_time;
        if let Some(start) = year_start(year) {
            if first_snap.start_time - length >= start {
                reasons.push(PartialReason::SeriesStart);
            }
        }
    }

    if is_last {
        if let Some(next) = year_start(year + 1) {
            if last.snapshot.end_time < next {
                reasons.push(PartialReason::Accumulating);
            }
        }
    }

    reasons
}

/// Calendar year a period belongs to
pub fn period_year(record: &ReconciledRecord) -> i32 {
    record.snapshot.start_time.year()
}
