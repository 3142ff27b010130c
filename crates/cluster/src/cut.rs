use crate::error::{ClusterError, Result};
use crate::linkage::MergeTree;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How a merge tree is flattened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutType {
    /// Keep merges at or below a height threshold
    Height,
    /// Keep undoing the latest merge until `k` clusters remain
    Count,
}

impl CutType {
    pub const fn token(self) -> &'static str {
        match self {
            CutType::Height => "H",
            CutType::Count => "N",
        }
    }
}

impl FromStr for CutType {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "height" => Ok(CutType::Height),
            "n" | "count" => Ok(CutType::Count),
            _ => Err(ClusterError::UnknownCutType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub kind: CutType,
    pub value: f64,
}

impl Cut {
    pub fn height(value: f64) -> Self {
        Self {
            kind: CutType::Height,
            value,
        }
    }

    pub fn count(k: usize) -> Self {
        Self {
            kind: CutType::Count,
            value: k as f64,
        }
    }

    /// Leaf labels (`labels[leaf]`) after cutting `tree`
    pub fn apply(&self, tree: &MergeTree) -> Result<Vec<usize>> {
        match self.kind {
            CutType::Height => TreeCutter::by_height(tree, self.value),
            CutType::Count => {
                if !self.value.is_finite() || self.value < 1.0 || self.value.fract() != 0.0 {
                    return Err(ClusterError::InvalidCut(format!(
                        "cluster count must be a positive integer, got {}",
                        self.value
                    )));
                }
                TreeCutter::by_count(tree, self.value as usize)
            }
        }
    }

    /// Default decomposition name, e.g. `H0.5` or `N3`
    pub fn name(&self) -> String {
        format!("{}{}", self.kind.token(), self.value)
    }

    /// [`Cut::name`], suffixed with the smallest free `(i)` when taken
    pub fn unique_name<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> String {
        let existing: Vec<&str> = existing.into_iter().collect();
        let base = self.name();
        if !existing.contains(&base.as_str()) {
            return base;
        }
        (1..)
            .map(|i| format!("{base}({i})"))
            .find(|candidate| !existing.contains(&candidate.as_str()))
            .unwrap_or(base)
    }
}

impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

pub struct TreeCutter;

impl TreeCutter {
    /// Drop every merge above `threshold`; the remaining connected leaves form clusters.
    ///
    /// A merge counts at the highest merge in its subtree, so on centroid or
    /// median trees with inversions a parent above a dropped child is dropped too.
    pub fn by_height(tree: &MergeTree, threshold: f64) -> Result<Vec<usize>> {
        if !threshold.is_finite() {
            return Err(ClusterError::InvalidCut(format!(
                "height must be finite, got {threshold}"
            )));
        }
        let labels = Self::components(tree, |_, subtree_height| subtree_height <= threshold);
        log::debug!(
            "Height cut at {threshold} produced {} clusters",
            cluster_count(&labels)
        );
        Ok(labels)
    }

    /// Undo the most recent merges until exactly `k` clusters remain.
    pub fn by_count(tree: &MergeTree, k: usize) -> Result<Vec<usize>> {
        let n = tree.leaf_count;
        if k > n {
            return Err(ClusterError::TooManyClusters {
                requested: k,
                leaves: n,
            });
        }
        if k == 0 {
            return Err(ClusterError::InvalidCut("cluster count must be >= 1".into()));
        }
        let kept = n - k;
        Ok(Self::components(tree, |step, _| step < kept))
    }

    /// `keep(step, subtree_height)` must also hold for every earlier merge below
    /// a kept one, so that unioning subtree representatives joins whole subtrees.
    fn components(tree: &MergeTree, keep: impl Fn(usize, f64) -> bool) -> Vec<usize> {
        let n = tree.leaf_count;
        let mut representative: Vec<usize> = (0..n).collect();
        let mut subtree_height = vec![0.0f64; n];
        let mut sets = UnionFind::<usize>::new(n);

        for (step, merge) in tree.merges.iter().enumerate() {
            let left = representative[merge.left];
            let right = representative[merge.right];
            let height = merge
                .height
                .max(subtree_height[merge.left])
                .max(subtree_height[merge.right]);
            representative.push(left);
            subtree_height.push(height);
            if keep(step, height) {
                sets.union(left, right);
            }
        }

        let mut labels_by_root: HashMap<usize, usize> = HashMap::new();
        (0..n)
            .map(|leaf| {
                let root = sets.find_mut(leaf);
                let next = labels_by_root.len();
                *labels_by_root.entry(root).or_insert(next)
            })
            .collect()
    }
}

fn cluster_count(labels: &[usize]) -> usize {
    labels.iter().max().map_or(0, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linkage::{HierarchicalClusterer, Linkage};
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    fn line_tree() -> MergeTree {
        let points = array![[0.0], [1.0], [5.0], [6.5], [20.0]];
        HierarchicalClusterer::new(Linkage::Single)
            .cluster(&points)
            .unwrap()
    }

    #[test]
    fn test_parse_cut_type() {
        assert_eq!("H".parse::<CutType>().unwrap(), CutType::Height);
        assert_eq!("count".parse::<CutType>().unwrap(), CutType::Count);
        assert!(matches!(
            "X".parse::<CutType>(),
            Err(ClusterError::UnknownCutType(_))
        ));
    }

    #[test]
    fn test_height_cut() {
        let tree = line_tree();
        assert_eq!(TreeCutter::by_height(&tree, 2.0).unwrap(), vec![0, 0, 1, 1, 2]);
        assert_eq!(TreeCutter::by_height(&tree, 0.5).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(TreeCutter::by_height(&tree, 100.0).unwrap(), vec![0; 5]);
        // boundary merges are kept
        assert_eq!(TreeCutter::by_height(&tree, 1.0).unwrap(), vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_height_cut_with_centroid_inversion() {
        // (0, 1) merges at 2.0, then leaf 2 joins their centroid at 1.8
        let points = array![[0.0, 0.0], [2.0, 0.0], [1.0, 1.8]];
        let tree = HierarchicalClusterer::new(Linkage::Centroid)
            .cluster(&points)
            .unwrap();
        assert_eq!((tree.merges[1].left, tree.merges[1].right), (2, 3));
        assert!(tree.merges[1].height < tree.merges[0].height);

        assert_eq!(TreeCutter::by_height(&tree, 1.9).unwrap(), vec![0, 1, 2]);
        assert_eq!(TreeCutter::by_height(&tree, 2.0).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_count_cut() {
        let tree = line_tree();
        assert_eq!(TreeCutter::by_count(&tree, 2).unwrap(), vec![0, 0, 0, 0, 1]);
        assert_eq!(TreeCutter::by_count(&tree, 3).unwrap(), vec![0, 0, 1, 1, 2]);
        assert_eq!(TreeCutter::by_count(&tree, 5).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(TreeCutter::by_count(&tree, 1).unwrap(), vec![0; 5]);
    }

    #[test]
    fn test_count_cut_rejects_too_many_clusters() {
        let tree = line_tree();
        assert!(matches!(
            TreeCutter::by_count(&tree, 6),
            Err(ClusterError::TooManyClusters {
                requested: 6,
                leaves: 5
            })
        ));
        assert!(Cut::count(0).apply(&tree).is_err());
        assert!(Cut {
            kind: CutType::Count,
            value: 2.5
        }
        .apply(&tree)
        .is_err());
    }

    #[test]
    fn test_cut_names() {
        assert_eq!(Cut::height(0.5).name(), "H0.5");
        assert_eq!(Cut::count(3).name(), "N3");
        assert_eq!(Cut::count(3).unique_name(["N3", "N3(1)"]), "N3(2)");
        assert_eq!(Cut::height(2.0).unique_name(["N3"]), "H2");
    }

    fn arb_points() -> impl Strategy<Value = Array2<f64>> {
        (2usize..12).prop_flat_map(|n| {
            prop::collection::vec(-10.0f64..10.0, n * 2).prop_map(move |values| {
                Array2::from_shape_vec((n, 2), values).unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn proptest_count_cut_covers_all_leaves(points in arb_points(), k_seed in 0usize..100) {
            let n = points.nrows();
            let k = 1 + k_seed % n;
            let tree = HierarchicalClusterer::new(Linkage::Average).cluster(&points).unwrap();
            let labels = TreeCutter::by_count(&tree, k).unwrap();

            prop_assert_eq!(labels.len(), n);
            prop_assert_eq!(cluster_count(&labels), k);
            for label in 0..k {
                prop_assert!(labels.contains(&label));
            }
        }

        #[test]
        fn proptest_height_cut_covers_all_leaves(points in arb_points(), h in 0.0f64..20.0) {
            let tree = HierarchicalClusterer::new(Linkage::Complete).cluster(&points).unwrap();
            let labels = TreeCutter::by_height(&tree, h).unwrap();
            let clusters = cluster_count(&labels);

            prop_assert_eq!(labels.len(), points.nrows());
            prop_assert!(clusters >= 1 && clusters <= points.nrows());
            // labels appear in first-seen order
            let mut seen = 0;
            for &label in &labels {
                prop_assert!(label <= seen);
                if label == seen {
                    seen += 1;
                }
            }
        }
    }
}
