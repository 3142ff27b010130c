use crate::access::AccessProfile;
use crate::error::{ClusterError, Result};
use crate::types::TraceMap;
use crate::weights::SimilarityWeights;
use ndarray::Array2;
use std::collections::{HashMap, HashSet};

/// Directional entity similarity. Row `i` holds how strongly entity `i` relates
/// to every other entity, normalized by `i`'s own controllers; `[i][j]` and
/// `[j][i]` generally differ. The diagonal is a fixed 1.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    pub labels: Vec<String>,
    pub values: Array2<f64>,
}

impl SimilarityMatrix {
    pub fn dimension(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[[row, col]]
    }

    /// Average `[i][j]` with `[j][i]`. Not applied by the default pipeline.
    pub fn symmetrized(&self) -> Self {
        let transposed = self.values.t();
        let values = (&self.values + &transposed) / 2.0;
        Self {
            labels: self.labels.clone(),
            values,
        }
    }
}

/// Adjacency statistics for an ordered entity pair `(first, second)`
#[derive(Debug, Default, Clone, Copy)]
struct SequenceStats {
    /// Times `first` was immediately followed by `second`
    hits: usize,
    /// Sum of `len - 1` over controllers with at least one hit
    span: usize,
}

pub struct SimilarityMatrixBuilder {
    weights: SimilarityWeights,
}

impl SimilarityMatrixBuilder {
    pub fn new(weights: SimilarityWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn build(&self, profile: &AccessProfile, traces: &TraceMap) -> Result<SimilarityMatrix> {
        let labels: Vec<String> = profile.entities().map(str::to_string).collect();
        let n = labels.len();
        if n < 2 {
            return Err(ClusterError::too_few("entities", 2, n));
        }

        let index: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let controller_sets: Vec<HashSet<&str>> = profile
            .iter()
            .map(|(_, controllers)| controllers.iter().map(|c| c.controller.as_str()).collect())
            .collect();
        let write_sets: Vec<HashSet<&str>> = profile
            .iter()
            .map(|(_, controllers)| {
                controllers
                    .iter()
                    .filter(|c| c.writes())
                    .map(|c| c.controller.as_str())
                    .collect()
            })
            .collect();

        let sequences = sequence_stats(traces, &index);

        let mut values = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            let own = controller_sets[i].len() as f64;
            for j in 0..n {
                if i == j {
                    values[[i, j]] = 1.0;
                    continue;
                }

                let access_overlap = controller_sets[i]
                    .intersection(&controller_sets[j])
                    .count() as f64
                    / own;
                let rw_overlap =
                    write_sets[i].intersection(&write_sets[j]).count() as f64 / own;
                let sequence_metric = match sequences.get(&(i, j)) {
                    Some(stats) if stats.span > 0 => stats.hits as f64 / stats.span as f64,
                    _ => 0.0,
                };

                values[[i, j]] = self.weights.access * access_overlap
                    + self.weights.read_write * rw_overlap
                    + self.weights.sequence * sequence_metric;
            }
        }

        log::debug!("Built {n}x{n} similarity matrix from {} traces", traces.len());

        Ok(SimilarityMatrix { labels, values })
    }
}

fn sequence_stats(
    traces: &TraceMap,
    index: &HashMap<&str, usize>,
) -> HashMap<(usize, usize), SequenceStats> {
    let mut stats: HashMap<(usize, usize), SequenceStats> = HashMap::new();

    for trace in traces.iter() {
        let accesses = &trace.accesses;
        if accesses.len() < 2 {
            continue;
        }

        let mut hits_here: HashMap<(usize, usize), usize> = HashMap::new();
        for pair in accesses.windows(2) {
            let (Some(&a), Some(&b)) = (
                index.get(pair[0].entity.as_str()),
                index.get(pair[1].entity.as_str()),
            ) else {
                continue;
            };
            if a != b {
                *hits_here.entry((a, b)).or_default() += 1;
            }
        }

        for (key, hits) in hits_here {
            let entry = stats.entry(key).or_default();
            entry.hits += hits;
            entry.span += accesses.len() - 1;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessAggregator;
    use crate::types::{Access, AccessMode};
    use proptest::prelude::*;

    fn traces() -> TraceMap {
        let mut traces = TraceMap::new();
        traces.push(
            "ctrlA",
            vec![
                Access::new("E1", AccessMode::Read),
                Access::new("E2", AccessMode::Write),
                Access::new("E1", AccessMode::Write),
            ],
        );
        traces.push(
            "ctrlB",
            vec![
                Access::new("E2", AccessMode::Write),
                Access::new("E3", AccessMode::Write),
            ],
        );
        traces
    }

    fn build(weights: SimilarityWeights) -> SimilarityMatrix {
        let traces = traces();
        let profile = AccessAggregator::aggregate(&traces);
        SimilarityMatrixBuilder::new(weights)
            .unwrap()
            .build(&profile, &traces)
            .unwrap()
    }

    #[test]
    fn test_access_overlap_is_anchored_on_row_entity() {
        let matrix = build(SimilarityWeights::new(1.0, 0.0, 0.0).unwrap());

        assert_eq!(matrix.labels, vec!["E1", "E2", "E3"]);
        // E1 is seen by ctrlA only, which also sees E2
        assert_eq!(matrix.get(0, 1), 1.0);
        // E2 is seen by ctrlA and ctrlB, only ctrlA sees E1
        assert_eq!(matrix.get(1, 0), 0.5);
        assert_eq!(matrix.get(0, 2), 0.0);
    }

    #[test]
    fn test_read_write_overlap_counts_shared_writers() {
        let matrix = build(SimilarityWeights::new(0.0, 1.0, 0.0).unwrap());

        // ctrlA writes E1 and E2; ctrlB writes E2 and E3
        assert_eq!(matrix.get(0, 1), 1.0);
        assert_eq!(matrix.get(1, 0), 0.5);
        assert_eq!(matrix.get(1, 2), 0.5);
        assert_eq!(matrix.get(2, 1), 1.0);
    }

    #[test]
    fn test_sequence_metric_uses_direction() {
        let matrix = build(SimilarityWeights::new(0.0, 0.0, 1.0).unwrap());

        // E1 -> E2 once in ctrlA (len 3 -> span 2)
        assert_eq!(matrix.get(0, 1), 0.5);
        // E2 -> E1 once in ctrlA
        assert_eq!(matrix.get(1, 0), 0.5);
        // E2 -> E3 once in ctrlB (span 1)
        assert_eq!(matrix.get(1, 2), 1.0);
        // E3 never precedes anything
        assert_eq!(matrix.get(2, 1), 0.0);
    }

    #[test]
    fn test_diagonal_is_one() {
        let matrix = build(SimilarityWeights::new(0.0, 0.0, 0.0).unwrap());
        for i in 0..matrix.dimension() {
            assert_eq!(matrix.get(i, i), 1.0);
        }
    }

    #[test]
    fn test_single_entity_fails() {
        let mut traces = TraceMap::new();
        traces.push("only", vec![Access::new("E1", AccessMode::Read)]);
        let profile = AccessAggregator::aggregate(&traces);

        let err = SimilarityMatrixBuilder::new(SimilarityWeights::default())
            .unwrap()
            .build(&profile, &traces)
            .unwrap_err();
        assert!(matches!(err, ClusterError::TooFewItems { actual: 1, .. }));
    }

    #[test]
    fn test_symmetrized_averages_pairs() {
        let matrix = build(SimilarityWeights::new(1.0, 0.0, 0.0).unwrap()).symmetrized();
        assert_eq!(matrix.get(0, 1), 0.75);
        assert_eq!(matrix.get(1, 0), 0.75);
    }

    fn arb_case() -> impl Strategy<Value = (TraceMap, [f64; 3])> {
        let access = (0usize..6, any::<bool>()).prop_map(|(entity, write)| {
            let mode = if write {
                AccessMode::Write
            } else {
                AccessMode::Read
            };
            Access::new(format!("E{entity}"), mode)
        });
        let controllers = prop::collection::vec(prop::collection::vec(access, 1..10), 1..6);
        let weights = [0.0f64..5.0, 0.0f64..5.0, 0.0f64..5.0];
        (controllers, weights).prop_map(|(controllers, weights)| {
            let mut traces = TraceMap::new();
            for (i, accesses) in controllers.into_iter().enumerate() {
                traces.push(format!("C{i}"), accesses);
            }
            (traces, weights)
        })
    }

    proptest! {
        #[test]
        fn proptest_values_bounded_by_weight_sum((traces, w) in arb_case()) {
            let profile = AccessAggregator::aggregate(&traces);
            prop_assume!(profile.entity_count() >= 2);

            let weights = SimilarityWeights::new(w[0], w[1], w[2]).unwrap();
            let matrix = SimilarityMatrixBuilder::new(weights)
                .unwrap()
                .build(&profile, &traces)
                .unwrap();

            let n = profile.entity_count();
            prop_assert_eq!(matrix.values.dim(), (n, n));
            let bound = weights.total() + 1e-9;
            for i in 0..n {
                for j in 0..n {
                    let v = matrix.get(i, j);
                    if i == j {
                        prop_assert_eq!(v, 1.0);
                    } else {
                        prop_assert!((0.0..=bound).contains(&v), "[{}][{}] = {}", i, j, v);
                    }
                }
            }
        }
    }
}
