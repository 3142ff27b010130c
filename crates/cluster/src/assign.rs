use crate::error::{ClusterError, Result};
use crate::types::{AccessMode, Partition, TraceMap};
use std::collections::HashMap;

/// Cluster that receives entities nobody accessed
pub const DEFAULT_CLUSTER: &str = "0";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct AccessCounts {
    reads: usize,
    writes: usize,
}

impl AccessCounts {
    fn total(self) -> usize {
        self.reads + self.writes
    }
}

/// Moves entities onto a feature-level partition: each entity joins the cluster
/// whose features access it most.
pub struct EntityClusterAssigner<'a> {
    traces: &'a TraceMap,
}

impl<'a> EntityClusterAssigner<'a> {
    pub fn new(traces: &'a TraceMap) -> Self {
        Self { traces }
    }

    /// `features` is a partition of controller/feature names; `entities` is the
    /// full entity universe. Features without a recorded trace contribute nothing.
    ///
    /// The returned partition has exactly the cluster ids of `features`, in the
    /// same order, with possibly empty member lists.
    pub fn assign(
        &self,
        features: &Partition<String>,
        entities: &[String],
    ) -> Result<Partition<String>> {
        let entity_index: HashMap<&str, usize> = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.as_str(), i))
            .collect();
        let cluster_count = features.len();
        let mut counts = vec![vec![AccessCounts::default(); cluster_count]; entities.len()];

        for (cluster_pos, cluster) in features.clusters().iter().enumerate() {
            for feature in &cluster.members {
                let Some(trace) = self.traces.get(feature) else {
                    log::debug!("Feature {feature} has no recorded accesses");
                    continue;
                };
                for access in &trace.accesses {
                    let &entity = entity_index
                        .get(access.entity.as_str())
                        .ok_or_else(|| ClusterError::UnknownEntity(access.entity.clone()))?;
                    let slot = &mut counts[entity][cluster_pos];
                    match access.mode {
                        AccessMode::Read => slot.reads += 1,
                        AccessMode::Write => slot.writes += 1,
                    }
                }
            }
        }

        let mut assigned = Partition::new();
        for cluster in features.clusters() {
            assigned.ensure_cluster(&cluster.id);
        }

        for (entity, per_cluster) in entities.iter().zip(&counts) {
            let mut best: Option<(usize, usize)> = None;
            for (pos, c) in per_cluster.iter().enumerate() {
                let total = c.total();
                if total > best.map_or(0, |(_, t)| t) {
                    best = Some((pos, total));
                }
            }
            let target = match best {
                Some((pos, _)) => features.clusters()[pos].id.as_str(),
                None => DEFAULT_CLUSTER,
            };
            assigned.insert(target, entity.clone());
        }

        log::debug!(
            "Assigned {} entities across {} feature clusters",
            entities.len(),
            cluster_count
        );

        Ok(assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Access;
    use pretty_assertions::assert_eq;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn traces() -> TraceMap {
        let mut traces = TraceMap::new();
        traces.push(
            "f1",
            vec![
                Access::new("1", AccessMode::Read),
                Access::new("2", AccessMode::Write),
                Access::new("2", AccessMode::Read),
            ],
        );
        traces.push("f2", vec![Access::new("2", AccessMode::Write)]);
        traces.push(
            "f3",
            vec![
                Access::new("3", AccessMode::Write),
                Access::new("1", AccessMode::Read),
            ],
        );
        traces
    }

    #[test]
    fn test_majority_assignment() {
        let features = Partition::from_labels(&[0, 1, 1], names(&["f1", "f2", "f3"]));
        let entities = names(&["1", "2", "3", "4"]);

        let assigned = EntityClusterAssigner::new(&traces())
            .assign(&features, &entities)
            .unwrap();

        // 1: one access in each cluster -> first cluster wins the tie
        // 2: two accesses in "0", one in "1"
        // 3: only in "1"; 4: never accessed -> default
        assert_eq!(assigned.get("0").unwrap(), &["1", "2", "4"]);
        assert_eq!(assigned.get("1").unwrap(), &["3"]);
        assert_eq!(assigned.member_count(), entities.len());
    }

    #[test]
    fn test_empty_clusters_are_reported() {
        let features = Partition::from_labels(&[0, 1, 2], names(&["f1", "f3", "missing"]));
        let entities = names(&["1", "2", "3"]);

        let assigned = EntityClusterAssigner::new(&traces())
            .assign(&features, &entities)
            .unwrap();

        let ids: Vec<_> = assigned.ids().collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
        assert_eq!(assigned.get("2").unwrap().len(), 0);
        assert_eq!(assigned.member_count(), 3);
    }

    #[test]
    fn test_unknown_entity_fails() {
        let features = Partition::from_labels(&[0], names(&["f1"]));
        let err = EntityClusterAssigner::new(&traces())
            .assign(&features, &names(&["1"]))
            .unwrap_err();
        assert!(matches!(err, ClusterError::UnknownEntity(e) if e == "2"));
    }
}
