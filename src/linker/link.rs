//! Confidence-gated link evaluation between two entity records
//!
//! | evidence                                            | outcome              |
//! |-----------------------------------------------------|----------------------|
//! | shared payment address or transaction hash          | high, merged         |
//! | two or more of username, display name, shared URL   | medium, merged       |
//! | exactly one of those                                | `AmbiguousEvidence`  |
//! | same avatar or same name tokens, nothing stronger   | low, never merged    |
//!
//! High and medium links only join records from different indices.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::EntityRecord;
use super::errors::LinkError;
use super::normalize::{identifier, AttributeNormalizer};

/// Strength of an evidence chain. Ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    /// True for links that join entities into one ledger cluster
    pub fn merges(&self) -> bool {
        *self >= Confidence::Medium
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkBasis {
    PaymentAddress,
    TxHash,
    Username,
    DisplayName,
    Url,
    Avatar,
    NameTokens,
}

impl LinkBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkBasis::PaymentAddress => "payment_address",
            LinkBasis::TxHash => "tx_hash",
            LinkBasis::Username => "username",
            LinkBasis::DisplayName => "display_name",
            LinkBasis::Url => "url",
            LinkBasis::Avatar => "avatar",
            LinkBasis::NameTokens => "name_tokens",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkEvidence {
    pub basis: LinkBasis,
    /// The normalized value both records share
    pub value: String,
}

impl fmt::Display for LinkEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.basis.as_str(), self.value)
    }
}

/// A link edge between two entity records. `left < right` by entity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLink {
    pub left: String,
    pub right: String,
    pub confidence: Confidence,
    pub evidence: Vec<LinkEvidence>,
}

/// Everything learned from comparing one pair
#[derive(Debug, Default)]
pub struct PairOutcome {
    /// High or medium merge link
    pub merge: Option<EntityLink>,
    /// Single-attribute overlap
    pub ambiguous: Option<LinkError>,
    /// Similarity-only links, surfaced but never merged
    pub similar: Vec<EntityLink>,
}

impl PairOutcome {
    pub fn is_empty(&self) -> bool {
        self.merge.is_none() && self.ambiguous.is_none() && self.similar.is_empty()
    }
}

/// Normalized view of an entity's matchable attributes
#[derive(Debug, Clone, Default)]
pub(crate) struct Attributes {
    pub addresses: BTreeSet<String>,
    pub tx_hashes: BTreeSet<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub name_tokens: BTreeSet<String>,
    pub urls: BTreeSet<String>,
    /// `None` for missing or placeholder avatars
    pub avatar: Option<String>,
}

impl Attributes {
    pub(crate) fn of(
        entity: &EntityRecord,
        normalizer: &AttributeNormalizer,
        default_avatars: &BTreeSet<String>,
    ) -> Self {
        Self {
            addresses: entity.payment_addresses.iter().filter_map(|a| identifier(a)).collect(),
            tx_hashes: entity.tx_hashes.iter().filter_map(|h| identifier(h)).collect(),
            username: entity.username.as_deref().and_then(|u| normalizer.username(u)),
            display_name: entity
                .display_name
                .as_deref()
                .and_then(|n| normalizer.display_name(n)),
            name_tokens: entity
                .display_name
                .as_deref()
                .map(|n| normalizer.name_tokens(n))
                .unwrap_or_default(),
            urls: entity.urls.iter().filter_map(|u| normalizer.url(u)).collect(),
            avatar: entity
                .avatar_id
                .as_deref()
                .and_then(identifier)
                .filter(|a| !default_avatars.contains(a)),
        }
    }
}

fn shared(basis: LinkBasis, a: &BTreeSet<String>, b: &BTreeSet<String>) -> Vec<LinkEvidence> {
    a.intersection(b)
        .map(|value| LinkEvidence {
            basis,
            value: value.clone(),
        })
        .collect()
}

fn same(basis: LinkBasis, a: &Option<String>, b: &Option<String>) -> Option<LinkEvidence> {
    match (a, b) {
        (Some(x), Some(y)) if x == y => Some(LinkEvidence {
            basis,
            value: x.clone(),
        }),
        _ => None,
    }
}

/// Compare two records. `a.entity_id < b.entity_id` is expected.
pub(crate) fn evaluate_pair(
    a: &EntityRecord,
    attrs_a: &Attributes,
    b: &EntityRecord,
    attrs_b: &Attributes,
) -> PairOutcome {
    let mut outcome = PairOutcome::default();
    let edge = |confidence: Confidence, evidence: Vec<LinkEvidence>| EntityLink {
        left: a.entity_id.clone(),
        right: b.entity_id.clone(),
        confidence,
        evidence,
    };

    if a.index != b.index {
        let mut direct = shared(LinkBasis::PaymentAddress, &attrs_a.addresses, &attrs_b.addresses);
        direct.extend(shared(LinkBasis::TxHash, &attrs_a.tx_hashes, &attrs_b.tx_hashes));
        if !direct.is_empty() {
            outcome.merge = Some(edge(Confidence::High, direct));
            return outcome;
        }

        // each attribute counts once, however many URLs are shared
        let mut overlap: Vec<LinkEvidence> = Vec::new();
        overlap.extend(same(LinkBasis::Username, &attrs_a.username, &attrs_b.username));
        overlap.extend(same(
            LinkBasis::DisplayName,
            &attrs_a.display_name,
            &attrs_b.display_name,
        ));
        let urls = shared(LinkBasis::Url, &attrs_a.urls, &attrs_b.urls);
        let url_hit = !urls.is_empty();
        overlap.extend(urls);

        let attributes_hit = overlap
            .iter()
            .filter(|e| e.basis != LinkBasis::Url)
            .count()
            + usize::from(url_hit);

        if attributes_hit >= 2 {
            outcome.merge = Some(edge(Confidence::Medium, overlap));
            return outcome;
        }
        if let Some(single) = overlap.into_iter().next() {
            outcome.ambiguous = Some(LinkError::AmbiguousEvidence {
                left: a.entity_id.clone(),
                right: b.entity_id.clone(),
                basis: single.basis,
                value: single.value,
            });
        }
    }

    if let Some(avatar) = same(LinkBasis::Avatar, &attrs_a.avatar, &attrs_b.avatar) {
        outcome.similar.push(edge(Confidence::Low, vec![avatar]));
    }
    if !attrs_a.name_tokens.is_empty()
        && attrs_a.name_tokens == attrs_b.name_tokens
        && attrs_a.display_name != attrs_b.display_name
    {
        let joined: Vec<&str> = attrs_a.name_tokens.iter().map(String::as_str).collect();
        outcome.similar.push(edge(
            Confidence::Low,
            vec![LinkEvidence {
                basis: LinkBasis::NameTokens,
                value: joined.join(" "),
            }],
        ));
    }

    outcome
}
