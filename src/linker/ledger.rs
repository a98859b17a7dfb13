//! Unified Flow Ledger
//!
//! All entity records closed under high/medium links. Clusters are computed
//! with a union-find over record positions; low links and ambiguous
//! attempts are kept alongside for the flag rules but never join clusters.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::entity::EntityRecord;
use super::errors::{LinkError, LinkResult};
use super::link::{evaluate_pair, Attributes, Confidence, EntityLink, LinkBasis};
use super::normalize::AttributeNormalizer;
use crate::observability::{log_event, Event, MetricsRegistry};

/// Linker settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPolicy {
    /// Placeholder avatar ids that never count as a match
    pub default_avatar_ids: BTreeSet<String>,
    pub parallel: bool,
}

/// A single-attribute link attempt, surfaced instead of merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousLink {
    pub left: String,
    pub right: String,
    pub basis: LinkBasis,
    pub value: String,
}

/// A set of records closed under merge links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Smallest member id
    pub cluster_id: String,
    /// Sorted member ids
    pub members: Vec<String>,
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnifiedFlowLedger {
    /// Records sorted by entity id
    entities: Vec<EntityRecord>,
    /// High and medium links, sorted by `(left, right)`
    links: Vec<EntityLink>,
    /// Low links, sorted by `(left, right)`
    similar: Vec<EntityLink>,
    ambiguous: Vec<AmbiguousLink>,
    clusters: Vec<Cluster>,
    position: HashMap<String, usize>,
    cluster_of: Vec<usize>,
}

impl UnifiedFlowLedger {
    /// Link every record against every record that shares a candidate key
    /// with it, then close over merge links.
    pub fn build(
        mut entities: Vec<EntityRecord>,
        policy: &LinkPolicy,
        metrics: &MetricsRegistry,
    ) -> LinkResult<Self> {
        entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        for pair in entities.windows(2) {
            if pair[0].entity_id == pair[1].entity_id {
                return Err(LinkError::DuplicateEntity(pair[0].entity_id.clone()));
            }
        }

        let normalizer = AttributeNormalizer::new()?;
        let default_avatars: BTreeSet<String> = policy
            .default_avatar_ids
            .iter()
            .map(|a| a.trim().to_lowercase())
            .collect();
        let attrs: Vec<Attributes> = entities
            .iter()
            .map(|e| Attributes::of(e, &normalizer, &default_avatars))
            .collect();

        let pairs = candidate_pairs(&attrs);
        let compare = |&(i, j): &(usize, usize)| {
            evaluate_pair(&entities[i], &attrs[i], &entities[j], &attrs[j])
        };
        let outcomes: Vec<_> = if policy.parallel {
            pairs.par_iter().map(compare).collect()
        } else {
            pairs.iter().map(compare).collect()
        };

        let mut links = Vec::new();
        let mut similar = Vec::new();
        let mut ambiguous = Vec::new();
        for outcome in outcomes {
            if let Some(link) = outcome.merge {
                match link.confidence {
                    Confidence::High => metrics.increment_links_high(),
                    _ => metrics.increment_links_medium(),
                }
                links.push(link);
            }
            if let Some(LinkError::AmbiguousEvidence {
                left,
                right,
                basis,
                value,
            }) = outcome.ambiguous
            {
                metrics.increment_links_ambiguous();
                ambiguous.push(AmbiguousLink {
                    left,
                    right,
                    basis,
                    value,
                });
            }
            metrics.add_links_low(outcome.similar.len() as u64);
            similar.extend(outcome.similar);
        }

        let position: HashMap<String, usize> = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.entity_id.clone(), i))
            .collect();

        let mut sets = DisjointSet::new(entities.len());
        for link in &links {
            if let (Some(&l), Some(&r)) = (position.get(&link.left), position.get(&link.right)) {
                sets.union(l, r);
            }
        }

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..entities.len() {
            groups.entry(sets.find(i)).or_default().push(i);
        }
        // members are pushed in id order, so the first one names the cluster
        let mut clusters: Vec<Cluster> = groups
            .into_values()
            .map(|members| Cluster {
                cluster_id: entities[members[0]].entity_id.clone(),
                members: members.iter().map(|&m| entities[m].entity_id.clone()).collect(),
            })
            .collect();
        clusters.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));

        let mut cluster_of = vec![0; entities.len()];
        for (c, cluster) in clusters.iter().enumerate() {
            for member in &cluster.members {
                if let Some(&p) = position.get(member) {
                    cluster_of[p] = c;
                }
            }
        }

        let cluster_count = clusters.len().to_string();
        let link_count = links.len().to_string();
        let entity_count = entities.len().to_string();
        log_event(
            Event::LinksResolved,
            &[
                ("clusters", cluster_count.as_str()),
                ("entities", entity_count.as_str()),
                ("merge_links", link_count.as_str()),
            ],
        );

        Ok(Self {
            entities,
            links,
            similar,
            ambiguous,
            clusters,
            position,
            cluster_of,
        })
    }

    pub fn entities(&self) -> &[EntityRecord] {
        &self.entities
    }

    pub fn entity(&self, entity_id: &str) -> Option<&EntityRecord> {
        self.position.get(entity_id).map(|&i| &self.entities[i])
    }

    pub fn links(&self) -> &[EntityLink] {
        &self.links
    }

    pub fn similar_links(&self) -> &[EntityLink] {
        &self.similar
    }

    pub fn ambiguous_links(&self) -> &[AmbiguousLink] {
        &self.ambiguous
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// The cluster containing `entity_id`
    pub fn cluster_of(&self, entity_id: &str) -> Option<&Cluster> {
        let p = *self.position.get(entity_id)?;
        self.clusters.get(*self.cluster_of.get(p)?)
    }

    /// Members of a cluster as records
    pub fn members<'a>(&'a self, cluster: &'a Cluster) -> impl Iterator<Item = &'a EntityRecord> + 'a {
        cluster.members.iter().filter_map(move |id| self.entity(id))
    }

    /// Merge links inside one cluster
    pub fn links_within<'a>(&'a self, cluster: &'a Cluster) -> impl Iterator<Item = &'a EntityLink> + 'a {
        self.links
            .iter()
            .filter(move |l| cluster.members.binary_search(&l.left).is_ok())
    }

    pub fn same_cluster(&self, a: &str, b: &str) -> bool {
        match (self.position.get(a), self.position.get(b)) {
            (Some(&x), Some(&y)) => self.cluster_of[x] == self.cluster_of[y],
            _ => false,
        }
    }
}

/// Pairs of record positions sharing at least one candidate key, `i < j`,
/// deduplicated and ordered.
fn candidate_pairs(attrs: &[Attributes]) -> Vec<(usize, usize)> {
    let mut buckets: HashMap<(u8, &str), Vec<usize>> = HashMap::new();
    for (i, a) in attrs.iter().enumerate() {
        let mut keys: Vec<(u8, &str)> = Vec::new();
        keys.extend(a.addresses.iter().map(|v| (0u8, v.as_str())));
        keys.extend(a.tx_hashes.iter().map(|v| (1u8, v.as_str())));
        keys.extend(a.username.iter().map(|v| (2u8, v.as_str())));
        keys.extend(a.display_name.iter().map(|v| (3u8, v.as_str())));
        keys.extend(a.urls.iter().map(|v| (4u8, v.as_str())));
        keys.extend(a.avatar.iter().map(|v| (5u8, v.as_str())));
        for key in keys {
            buckets.entry(key).or_default().push(i);
        }
    }

    let mut token_buckets: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
    for (i, a) in attrs.iter().enumerate() {
        if !a.name_tokens.is_empty() {
            let key: Vec<&str> = a.name_tokens.iter().map(String::as_str).collect();
            token_buckets.entry(key).or_default().push(i);
        }
    }

    let mut pairs = BTreeSet::new();
    for members in buckets.values().chain(token_buckets.values()) {
        for (x, &i) in members.iter().enumerate() {
            for &j in &members[x + 1..] {
                if i != j {
                    pairs.insert((i.min(j), i.max(j)));
                }
            }
        }
    }
    pairs.into_iter().collect()
}
