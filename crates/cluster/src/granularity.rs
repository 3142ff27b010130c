//! Automatic granularity search over entity embeddings.
//!
//! Cuts the entity merge tree at 1, 2, 3, ... clusters and records every cut
//! whose non-empty cluster count stays within a ceiling derived from the
//! entity count. The first cut above the ceiling ends the search unrecorded.
//!
//! The cache check is a memoization guard, not a lock: two searches for the
//! same key may both miss and both write. Both writes carry the same content
//! for the same input, so the last one wins harmlessly.

use crate::cut::TreeCutter;
use crate::embedding::EmbeddingSet;
use crate::error::{ClusterError, Result};
use crate::linkage::{HierarchicalClusterer, Linkage, MergeTree};
use crate::types::Partition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Largest plausible number of services for `entity_count` entities
pub fn entity_ceiling(entity_count: usize) -> Result<usize> {
    match entity_count {
        0..=3 => Err(ClusterError::TooFewEntities(entity_count)),
        4..=9 => Ok(3),
        10..=19 => Ok(5),
        _ => Ok(10),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CutKey {
    pub linkage: Linkage,
    pub cluster_size: usize,
}

impl fmt::Display for CutKey {
    /// `average,3`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.linkage, self.cluster_size)
    }
}

/// Recorded cut: cluster id -> external entity ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GranularityCut {
    pub clusters: Partition<i64>,
    #[serde(rename = "nonEmptyClusterCount", alias = "numberOfEntitiesClusters")]
    pub non_empty_cluster_count: usize,
}

/// Key-value store for recorded cuts
pub trait CutCache {
    fn contains(&self, key: &CutKey) -> Result<bool>;
    fn load(&self, key: &CutKey) -> Result<Option<GranularityCut>>;
    fn store(&mut self, key: &CutKey, cut: &GranularityCut) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCutCache {
    entries: HashMap<CutKey, GranularityCut>,
}

impl MemoryCutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CutCache for MemoryCutCache {
    fn contains(&self, key: &CutKey) -> Result<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn load(&self, key: &CutKey) -> Result<Option<GranularityCut>> {
        Ok(self.entries.get(key).cloned())
    }

    fn store(&mut self, key: &CutKey, cut: &GranularityCut) -> Result<()> {
        self.entries.insert(*key, cut.clone());
        Ok(())
    }
}

/// Result of one attempt at a given cluster size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum CutOutcome {
    /// Recorded, with this many non-empty clusters
    Persisted(usize),
    /// Not recorded: this many non-empty clusters is above the ceiling
    ExceededCeiling(usize),
    /// A cut for this key is already recorded; the search is satisfied
    AlreadyCached,
    Failed(String),
}

impl CutOutcome {
    fn continues(&self) -> bool {
        matches!(self, CutOutcome::Persisted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub cluster_size: usize,
    #[serde(flatten)]
    pub outcome: CutOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GranularityReport {
    pub linkage: Linkage,
    pub entity_count: usize,
    pub ceiling: usize,
    pub attempts: Vec<Attempt>,
}

impl GranularityReport {
    /// Largest cluster size recorded by this run
    pub fn last_persisted(&self) -> Option<usize> {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, CutOutcome::Persisted(_)))
            .map(|a| a.cluster_size)
            .last()
    }
}

pub struct GranularitySearch<'c, C: CutCache> {
    cache: &'c mut C,
}

impl<'c, C: CutCache> GranularitySearch<'c, C> {
    pub fn new(cache: &'c mut C) -> Self {
        Self { cache }
    }

    /// Fails only when there are too few entities to search; every other problem
    /// ends the search with a `Failed` attempt and keeps what was recorded.
    pub fn run(&mut self, embeddings: &EmbeddingSet) -> Result<GranularityReport> {
        let entity_count = embeddings.len();
        let ceiling = entity_ceiling(entity_count)?;
        let linkage = embeddings.linkage;
        let mut report = GranularityReport {
            linkage,
            entity_count,
            ceiling,
            attempts: Vec::new(),
        };

        let tree = match embeddings
            .matrix()
            .and_then(|m| HierarchicalClusterer::new(linkage).cluster(&m))
        {
            Ok(tree) => tree,
            Err(err) => {
                log::warn!("Granularity search aborted before the first cut: {err}");
                report.attempts.push(Attempt {
                    cluster_size: 1,
                    outcome: CutOutcome::Failed(err.to_string()),
                });
                return Ok(report);
            }
        };

        let mut cluster_size = 1;
        loop {
            let outcome = self.attempt(embeddings, &tree, cluster_size, ceiling);
            log::info!("Granularity {linkage},{cluster_size}: {outcome:?}");
            let proceed = outcome.continues();
            report.attempts.push(Attempt {
                cluster_size,
                outcome,
            });
            if !proceed {
                break;
            }
            cluster_size += 1;
        }

        Ok(report)
    }

    fn attempt(
        &mut self,
        embeddings: &EmbeddingSet,
        tree: &MergeTree,
        cluster_size: usize,
        ceiling: usize,
    ) -> CutOutcome {
        let key = CutKey {
            linkage: embeddings.linkage,
            cluster_size,
        };

        match self.cache.contains(&key) {
            Ok(true) => return CutOutcome::AlreadyCached,
            Ok(false) => {}
            Err(err) => return CutOutcome::Failed(err.to_string()),
        }

        let labels = match TreeCutter::by_count(tree, cluster_size) {
            Ok(labels) => labels,
            Err(err) => return CutOutcome::Failed(err.to_string()),
        };

        // Entities without an external id keep their cluster present but empty
        let mut clusters = Partition::new();
        for (label, item) in labels.iter().zip(&embeddings.items) {
            let cluster = clusters.ensure_cluster(&label.to_string());
            if let Some(id) = item.external_id {
                cluster.members.push(id);
            }
        }
        let non_empty = clusters.non_empty_count();
        if non_empty > ceiling {
            return CutOutcome::ExceededCeiling(non_empty);
        }

        let cut = GranularityCut {
            clusters,
            non_empty_cluster_count: non_empty,
        };
        match self.cache.store(&key, &cut) {
            Ok(()) => CutOutcome::Persisted(non_empty),
            Err(err) => CutOutcome::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddedItem;
    use proptest::prelude::*;

    fn entities(n: usize, with_ids: impl Fn(usize) -> bool) -> EmbeddingSet {
        EmbeddingSet {
            linkage: Linkage::Average,
            items: (0..n)
                .map(|i| EmbeddedItem {
                    name: format!("Entity{i}"),
                    vector: vec![(i * i) as f64, (i % 3) as f64],
                    external_id: with_ids(i).then_some(i as i64 + 1),
                })
                .collect(),
        }
    }

    #[test]
    fn test_ceiling_bands() {
        assert!(matches!(entity_ceiling(3), Err(ClusterError::TooFewEntities(3))));
        assert_eq!(entity_ceiling(4).unwrap(), 3);
        assert_eq!(entity_ceiling(9).unwrap(), 3);
        assert_eq!(entity_ceiling(10).unwrap(), 5);
        assert_eq!(entity_ceiling(19).unwrap(), 5);
        assert_eq!(entity_ceiling(20).unwrap(), 10);
        assert_eq!(entity_ceiling(500).unwrap(), 10);
    }

    #[test]
    fn test_search_stops_after_ceiling() {
        let mut cache = MemoryCutCache::new();
        let report = GranularitySearch::new(&mut cache)
            .run(&entities(25, |_| true))
            .unwrap();

        assert_eq!(report.ceiling, 10);
        assert_eq!(report.last_persisted(), Some(10));
        let last = report.attempts.last().unwrap();
        assert_eq!(last.cluster_size, 11);
        assert_eq!(last.outcome, CutOutcome::ExceededCeiling(11));

        assert_eq!(cache.len(), 10);
        let beyond = CutKey {
            linkage: Linkage::Average,
            cluster_size: 11,
        };
        assert!(!cache.contains(&beyond).unwrap());
    }

    #[test]
    fn test_cached_key_satisfies_search() {
        let mut cache = MemoryCutCache::new();
        let set = entities(12, |_| true);
        GranularitySearch::new(&mut cache).run(&set).unwrap();
        let recorded = cache.len();

        let report = GranularitySearch::new(&mut cache).run(&set).unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].outcome, CutOutcome::AlreadyCached);
        assert_eq!(cache.len(), recorded);
    }

    #[test]
    fn test_entities_without_ids_are_placeholders() {
        let mut cache = MemoryCutCache::new();
        let set = entities(6, |i| i != 5);
        GranularitySearch::new(&mut cache).run(&set).unwrap();

        let key = CutKey {
            linkage: Linkage::Average,
            cluster_size: 1,
        };
        let cut = cache.load(&key).unwrap().unwrap();
        assert_eq!(cut.non_empty_cluster_count, 1);
        assert_eq!(cut.clusters.member_count(), 5);
    }

    #[test]
    fn test_too_few_entities_fails_fast() {
        let mut cache = MemoryCutCache::new();
        assert!(GranularitySearch::new(&mut cache)
            .run(&entities(3, |_| true))
            .is_err());
    }

    #[test]
    fn test_failed_store_ends_search() {
        struct ReadOnly;
        impl CutCache for ReadOnly {
            fn contains(&self, _: &CutKey) -> Result<bool> {
                Ok(false)
            }
            fn load(&self, _: &CutKey) -> Result<Option<GranularityCut>> {
                Ok(None)
            }
            fn store(&mut self, _: &CutKey, _: &GranularityCut) -> Result<()> {
                Err(ClusterError::cache("read-only"))
            }
        }

        let report = GranularitySearch::new(&mut ReadOnly)
            .run(&entities(8, |_| true))
            .unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert!(matches!(report.attempts[0].outcome, CutOutcome::Failed(_)));
        assert_eq!(report.last_persisted(), None);
    }

    proptest! {
        #[test]
        fn proptest_never_records_above_ceiling(n in 4usize..40, missing in 0usize..4) {
            let mut cache = MemoryCutCache::new();
            let set = entities(n, |i| i % 7 != missing);
            let report = GranularitySearch::new(&mut cache).run(&set).unwrap();

            for attempt in &report.attempts {
                if let CutOutcome::Persisted(count) = attempt.outcome {
                    prop_assert!(count <= report.ceiling);
                    let key = CutKey { linkage: Linkage::Average, cluster_size: attempt.cluster_size };
                    let stored = cache.load(&key).unwrap().unwrap();
                    prop_assert_eq!(stored.non_empty_cluster_count, count);
                }
            }
        }
    }
}
