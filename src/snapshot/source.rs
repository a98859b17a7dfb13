//! Raw source record shapes
//!
//! Two extractors feed the normalizer:
//! - the ledger index (audit grade): one row per epoch with opening/closing
//!   pots and per-category treasury movements
//! - the REST API snapshot (approximate): point-in-time tip readings, one per
//!   epoch boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::time::deserialize_utc;
use crate::money::{deserialize_opt_amount, Rate};

/// One epoch row from the ledger index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerIndexRow {
    pub epoch_no: u64,
    #[serde(deserialize_with = "deserialize_utc")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_utc")]
    pub end_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub fees_epoch: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub treasury_start: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub treasury_end: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub reserves_start: Option<i64>,
    #[serde(default)]
    pub rho: Option<Rate>,
    #[serde(default)]
    pub tau: Option<Rate>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub treasury_donations: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub pot_transfer_treasury: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub mir_treasury_payments: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub conway_enacted_withdrawals: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub deposit_net: Option<i64>,
    /// Identifier of the extraction query, used in evidence references
    #[serde(default)]
    pub query_ref: Option<String>,
}

/// One tip reading from the REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSnapshotRow {
    pub epoch_no: u64,
    #[serde(deserialize_with = "deserialize_utc")]
    pub tip_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub treasury: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub reserves: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub fees_epoch: Option<i64>,
    #[serde(default)]
    pub rho: Option<Rate>,
    #[serde(default)]
    pub tau: Option<Rate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_row_from_export_shape() {
        let row: LedgerIndexRow = serde_json::from_str(
            r#"{
                "epoch_no": 300,
                "start_time": "2021-11-20 21:44:51",
                "end_time": "2021-11-25 21:44:51",
                "fees_epoch": "1000000",
                "treasury_start": 10000000,
                "treasury_end": 10300000,
                "reserves_start": 500000000,
                "rho": 0.003,
                "tau": "0.2",
                "mir_treasury_payments": null
            }"#,
        )
        .unwrap();
        assert_eq!(row.fees_epoch, Some(1_000_000));
        assert_eq!(row.mir_treasury_payments, None);
        assert_eq!(row.pot_transfer_treasury, None);
        assert_eq!(row.rho, Some(Rate::parse("0.003").unwrap()));
    }

    #[test]
    fn test_api_row_unix_time() {
        let row: ApiSnapshotRow = serde_json::from_str(
            r#"{"epoch_no": 500, "tip_time": 1700000000, "treasury": "1500"}"#,
        )
        .unwrap();
        assert_eq!(row.tip_time.timestamp(), 1_700_000_000);
        assert_eq!(row.treasury, Some(1500));
        assert!(row.rho.is_none());
    }
}
