use boundary_cluster::{Linkage, Merge, MergeTree};
use serde::{Deserialize, Serialize};

/// Merge tree in a plotting-friendly shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DendrogramExport {
    pub linkage_method: Linkage,
    /// Leaf labels, indexed by leaf id
    pub labels: Vec<String>,
    pub merges: Vec<Merge>,
}

impl DendrogramExport {
    pub fn new(tree: &MergeTree, labels: Vec<String>) -> Self {
        Self {
            linkage_method: tree.linkage,
            labels,
            merges: tree.merges.clone(),
        }
    }

    pub fn max_height(&self) -> f64 {
        self.merges.iter().map(|m| m.height).fold(0.0, f64::max)
    }
}
