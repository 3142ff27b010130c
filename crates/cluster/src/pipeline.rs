use crate::access::AccessAggregator;
use crate::assign::EntityClusterAssigner;
use crate::cut::Cut;
use crate::embedding::{short_signature, EmbeddingSet};
use crate::error::Result;
use crate::linkage::{HierarchicalClusterer, Linkage, MergeTree};
use crate::quality::{self, ScoreGuard};
use crate::similarity::SimilarityMatrixBuilder;
use crate::types::{ClusterResult, Partition, TraceMap};
use crate::weights::{weights_label, SimilarityWeights, WeightGrid};
use serde::Serialize;

/// A cut merge tree plus the scored partition derived from it
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Leaf labels, one per tree leaf
    pub leaves: Vec<String>,
    pub tree: MergeTree,
    pub result: ClusterResult<String>,
}

impl Decomposition {
    pub fn cluster_count(&self) -> usize {
        self.result.clusters.len()
    }
}

/// Entities clustered by the weighted access-trace similarity.
///
/// An undefined quality score is an error on this path.
pub fn decompose_by_similarity(
    traces: &TraceMap,
    linkage: Linkage,
    cut: Cut,
    weights: SimilarityWeights,
) -> Result<Decomposition> {
    let profile = AccessAggregator::aggregate(traces);
    let matrix = SimilarityMatrixBuilder::new(weights)?.build(&profile, traces)?;
    let tree = HierarchicalClusterer::new(linkage).cluster(&matrix.values)?;
    let labels = cut.apply(&tree)?;
    let quality_score = quality::score(&matrix.values, &labels, ScoreGuard::Propagate)?;

    log::info!(
        "Similarity decomposition {cut}: {} entities",
        matrix.dimension()
    );

    Ok(Decomposition {
        result: ClusterResult {
            quality_score,
            clusters: Partition::from_labels(&labels, matrix.labels.iter().cloned()),
        },
        leaves: matrix.labels,
        tree,
    })
}

/// Features clustered by their embedding vectors, named by short signature
pub fn decompose_features(features: &EmbeddingSet, cut: Cut) -> Result<Decomposition> {
    let (tree, labels, quality_score) = cut_embeddings(features, cut)?;
    let leaves: Vec<String> = features
        .names()
        .map(|name| short_signature(name).to_string())
        .collect();

    Ok(Decomposition {
        result: ClusterResult {
            quality_score,
            clusters: Partition::from_labels(&labels, leaves.iter().cloned()),
        },
        leaves,
        tree,
    })
}

/// Traces (features) clustered by embedding, then entities attributed to the
/// cluster that accesses them most. `entities` is the full entity universe.
pub fn decompose_traces_to_entities(
    feature_traces: &EmbeddingSet,
    accesses: &TraceMap,
    entities: &[String],
    cut: Cut,
) -> Result<Decomposition> {
    let (tree, labels, quality_score) = cut_embeddings(feature_traces, cut)?;
    let leaves: Vec<String> = feature_traces.names().map(str::to_string).collect();
    let features = Partition::from_labels(&labels, leaves.iter().cloned());
    let clusters = EntityClusterAssigner::new(accesses).assign(&features, entities)?;

    Ok(Decomposition {
        result: ClusterResult {
            quality_score,
            clusters,
        },
        leaves,
        tree,
    })
}

fn cut_embeddings(set: &EmbeddingSet, cut: Cut) -> Result<(MergeTree, Vec<usize>, f64)> {
    let matrix = set.matrix()?;
    let tree = HierarchicalClusterer::new(set.linkage).cluster(&matrix)?;
    let labels = cut.apply(&tree)?;
    let quality_score = quality::score(&matrix, &labels, ScoreGuard::Fallback)?;
    log::info!("Embedding decomposition {cut}: {} items", set.len());
    Ok((tree, labels, quality_score))
}

/// One weight combination evaluated by [`sweep_weights`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub name: String,
    pub weights: [u32; 3],
    /// `None` when the partition has no defined quality score
    pub quality_score: Option<f64>,
    pub cluster_count: usize,
}

/// Evaluate every weight combination of `grid` with the same linkage and cut.
pub fn sweep_weights(
    traces: &TraceMap,
    linkage: Linkage,
    cut: Cut,
    grid: &WeightGrid,
    base_name: &str,
) -> Result<Vec<SweepEntry>> {
    let profile = AccessAggregator::aggregate(traces);
    let clusterer = HierarchicalClusterer::new(linkage);

    grid.combinations()
        .into_iter()
        .map(|percentages| {
            let weights = SimilarityWeights::from_percentages(percentages);
            let matrix = SimilarityMatrixBuilder::new(weights)?.build(&profile, traces)?;
            let tree = clusterer.cluster(&matrix.values)?;
            let labels = cut.apply(&tree)?;
            let quality_score = quality::silhouette(&matrix.values, &labels).ok();
            let cluster_count = labels.iter().max().map_or(0, |max| max + 1);

            Ok(SweepEntry {
                name: format!("{base_name},{}", weights_label(percentages)),
                weights: percentages,
                quality_score,
                cluster_count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddedItem;
    use crate::error::ClusterError;
    use crate::types::{Access, AccessMode};
    use pretty_assertions::assert_eq;

    fn order_traces() -> TraceMap {
        let mut traces = TraceMap::new();
        traces.push(
            "createOrder",
            vec![
                Access::new("Order", AccessMode::Write),
                Access::new("OrderLine", AccessMode::Write),
                Access::new("Customer", AccessMode::Read),
            ],
        );
        traces.push(
            "cancelOrder",
            vec![
                Access::new("Order", AccessMode::Write),
                Access::new("OrderLine", AccessMode::Write),
            ],
        );
        traces.push(
            "registerCustomer",
            vec![
                Access::new("Customer", AccessMode::Write),
                Access::new("Address", AccessMode::Write),
            ],
        );
        traces.push(
            "moveCustomer",
            vec![
                Access::new("Address", AccessMode::Write),
                Access::new("Customer", AccessMode::Read),
            ],
        );
        traces
    }

    fn features() -> EmbeddingSet {
        let item = |name: &str, vector: Vec<f64>| EmbeddedItem {
            name: name.to_string(),
            vector,
            external_id: None,
        };
        EmbeddingSet {
            linkage: Linkage::Average,
            items: vec![
                item("app.Orders.create(Order)", vec![0.0, 0.1, 0.0]),
                item("app.Orders.cancel(long)", vec![0.1, 0.0, 0.0]),
                item("app.Customers.register(Customer)", vec![5.0, 5.1, 4.9]),
                item("app.Customers.move(Address)", vec![5.1, 5.0, 5.0]),
            ],
        }
    }

    #[test]
    fn test_similarity_decomposition_groups_co_accessed_entities() {
        let weights = SimilarityWeights::new(0.5, 0.3, 0.2).unwrap();
        let decomposition =
            decompose_by_similarity(&order_traces(), Linkage::Average, Cut::count(2), weights)
                .unwrap();

        let clusters = &decomposition.result.clusters;
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters.get("0").unwrap(), &["Order", "OrderLine"]);
        assert_eq!(clusters.get("1").unwrap(), &["Customer", "Address"]);
        let score = decomposition.result.quality_score;
        assert!((-1.0..=1.0).contains(&score));
    }

    #[test]
    fn test_similarity_decomposition_propagates_quality_failure() {
        let err = decompose_by_similarity(
            &order_traces(),
            Linkage::Average,
            Cut::count(1),
            SimilarityWeights::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ClusterError::UndefinedQuality(_)));
    }

    #[test]
    fn test_feature_decomposition_four_features_two_clusters() {
        let decomposition = decompose_features(&features(), Cut::count(2)).unwrap();

        let clusters = &decomposition.result.clusters;
        assert_eq!(clusters.non_empty_count(), 2);
        assert_eq!(clusters.member_count(), 4);
        assert_eq!(clusters.get("0").unwrap(), &["create", "cancel"]);
        let score = decomposition.result.quality_score;
        assert!((-1.0..=1.0).contains(&score) && score > 0.9);
    }

    #[test]
    fn test_feature_decomposition_falls_back_on_single_cluster() {
        let decomposition = decompose_features(&features(), Cut::height(100.0)).unwrap();
        assert_eq!(decomposition.cluster_count(), 1);
        assert_eq!(decomposition.result.quality_score, 0.0);
    }

    #[test]
    fn test_trace_decomposition_assigns_entities() {
        let mut set = features();
        let names = ["createOrder", "cancelOrder", "registerCustomer", "moveCustomer"];
        for (item, name) in set.items.iter_mut().zip(names) {
            item.name = name.to_string();
        }
        let entities: Vec<String> = ["Order", "OrderLine", "Customer", "Address", "Invoice"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let decomposition =
            decompose_traces_to_entities(&set, &order_traces(), &entities, Cut::count(2)).unwrap();

        let clusters = &decomposition.result.clusters;
        assert_eq!(clusters.get("0").unwrap(), &["Order", "OrderLine", "Invoice"]);
        assert_eq!(clusters.get("1").unwrap(), &["Customer", "Address"]);
        assert_eq!(clusters.member_count(), entities.len());
    }

    #[test]
    fn test_sweep_covers_grid() {
        let grid = WeightGrid::new(50).unwrap();
        let entries =
            sweep_weights(&order_traces(), Linkage::Average, Cut::count(2), &grid, "d").unwrap();

        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].name, "d,100,0,0");
        assert!(entries.iter().all(|e| e.cluster_count == 2));
    }
}
