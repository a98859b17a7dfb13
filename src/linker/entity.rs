//! Entity records as published by the on-chain and off-chain indices

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::snapshot::parse_utc;

/// Where an index's records come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Onchain,
    Offchain,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexRef {
    pub name: String,
    pub kind: IndexKind,
}

impl IndexRef {
    pub fn new(name: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

/// What a money total measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalKind {
    /// Paid out to date according to the registry
    Distributed,
    Requested,
    Remaining,
    /// Observed on-chain payments to the entity's addresses
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyTotal {
    pub kind: TotalKind,
    pub money: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    #[serde(default)]
    pub fund_id: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub distributed: Option<Money>,
    #[serde(default)]
    pub requested: Option<Money>,
    #[serde(default, deserialize_with = "deserialize_opt_time")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row of an entity index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: String,
    pub index: IndexRef,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_id: Option<String>,
    #[serde(default)]
    pub payment_addresses: Vec<String>,
    #[serde(default)]
    pub tx_hashes: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub totals: Vec<MoneyTotal>,
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub funded_projects: u64,
    #[serde(default)]
    pub completed_projects: u64,
    #[serde(default)]
    pub total_projects: u64,
}

/// A sum of same-unit money at a common exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledSum {
    pub amount: i128,
    pub exponent: u32,
}

impl ScaledSum {
    /// Both sums at the larger exponent
    pub fn aligned(a: ScaledSum, b: ScaledSum) -> Option<(i128, i128, u32)> {
        let exponent = a.exponent.max(b.exponent);
        let lift = |s: ScaledSum| -> Option<i128> {
            s.amount.checked_mul(10i128.checked_pow(exponent - s.exponent)?)
        };
        Some((lift(a)?, lift(b)?, exponent))
    }

    pub fn checked_add(self, other: ScaledSum) -> Option<ScaledSum> {
        let (a, b, exponent) = Self::aligned(self, other)?;
        Some(ScaledSum {
            amount: a.checked_add(b)?,
            exponent,
        })
    }
}

/// Sum of every money value in `unit_code`; `None` when there is none.
pub fn sum_in_unit<'a, I>(values: I, unit_code: &str) -> Option<ScaledSum>
where
    I: IntoIterator<Item = &'a Money>,
{
    let code = unit_code.trim().to_ascii_uppercase();
    values
        .into_iter()
        .filter(|m| m.normalized_code() == code)
        .map(|m| ScaledSum {
            amount: m.amount as i128,
            exponent: m.exponent,
        })
        .try_fold(None::<ScaledSum>, |acc, s| match acc {
            None => Some(Some(s)),
            Some(prev) => prev.checked_add(s).map(Some),
        })
        .flatten()
}

impl EntityRecord {
    pub fn totals_of(&self, kind: TotalKind) -> impl Iterator<Item = &Money> {
        self.totals
            .iter()
            .filter(move |t| t.kind == kind)
            .map(|t| &t.money)
    }

    pub fn total_in(&self, kind: TotalKind, unit_code: &str) -> Option<ScaledSum> {
        sum_in_unit(self.totals_of(kind), unit_code)
    }

    /// Unit codes present among totals of `kind`, normalized and sorted
    pub fn units_of(&self, kind: TotalKind) -> Vec<String> {
        let mut units: Vec<String> = self.totals_of(kind).map(Money::normalized_code).collect();
        units.sort();
        units.dedup();
        units
    }

    /// Reference pointer used as flag evidence
    pub fn evidence_ref(&self) -> String {
        format!("{}/{}", self.index.name, self.entity_id)
    }
}

fn deserialize_opt_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        // registry exports carry epoch milliseconds
        Some(Raw::Millis(ms)) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms))),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => parse_utc(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", s))),
    }
}
