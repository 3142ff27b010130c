//! Bottom-up agglomerative clustering over observation rows.
//!
//! Rows of the input matrix are observations (embedding vectors or similarity
//! rows); pairwise Euclidean distances seed the merge loop and the chosen
//! linkage rule updates distances after each merge (Lance-Williams).

use crate::error::{ClusterError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Single,
    Complete,
    Average,
    Weighted,
    Centroid,
    Median,
    Ward,
}

impl Linkage {
    pub const ALL: [Linkage; 7] = [
        Linkage::Single,
        Linkage::Complete,
        Linkage::Average,
        Linkage::Weighted,
        Linkage::Centroid,
        Linkage::Median,
        Linkage::Ward,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Weighted => "weighted",
            Linkage::Centroid => "centroid",
            Linkage::Median => "median",
            Linkage::Ward => "ward",
        }
    }

    /// Methods whose update rule works on squared Euclidean distances
    const fn squared(self) -> bool {
        matches!(self, Linkage::Centroid | Linkage::Median | Linkage::Ward)
    }

    /// Distance from cluster `k` to the union of `i` and `j`.
    ///
    /// `d_*` are in the working space (squared for centroid/median/ward).
    fn update(self, d_ik: f64, d_jk: f64, d_ij: f64, n_i: f64, n_j: f64, n_k: f64) -> f64 {
        match self {
            Linkage::Single => d_ik.min(d_jk),
            Linkage::Complete => d_ik.max(d_jk),
            Linkage::Average => (n_i * d_ik + n_j * d_jk) / (n_i + n_j),
            Linkage::Weighted => (d_ik + d_jk) / 2.0,
            Linkage::Centroid => {
                let n_ij = n_i + n_j;
                (n_i * d_ik + n_j * d_jk) / n_ij - n_i * n_j * d_ij / (n_ij * n_ij)
            }
            Linkage::Median => d_ik / 2.0 + d_jk / 2.0 - d_ij / 4.0,
            Linkage::Ward => {
                let total = n_i + n_j + n_k;
                ((n_i + n_k) * d_ik + (n_j + n_k) * d_jk - n_k * d_ij) / total
            }
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Linkage {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Linkage::ALL
            .into_iter()
            .find(|l| l.as_str() == wanted)
            .ok_or_else(|| ClusterError::UnknownLinkage(s.to_string()))
    }
}

/// One merge step. Node ids: leaves are `0..n`, the merge at step `s` is `n + s`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub height: f64,
    /// Leaves under the merged node
    pub size: usize,
}

/// Binary merge tree over `leaf_count` leaves, merges in the order performed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeTree {
    pub linkage: Linkage,
    pub leaf_count: usize,
    pub merges: Vec<Merge>,
}

impl MergeTree {
    pub fn heights(&self) -> impl Iterator<Item = f64> + '_ {
        self.merges.iter().map(|m| m.height)
    }
}

pub struct HierarchicalClusterer {
    linkage: Linkage,
}

impl HierarchicalClusterer {
    pub fn new(linkage: Linkage) -> Self {
        Self { linkage }
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Cluster the rows of `observations`, producing exactly `n - 1` merges.
    ///
    /// Ties go to the pair with the lowest (row, column) slot indices.
    pub fn cluster(&self, observations: &Array2<f64>) -> Result<MergeTree> {
        let n = observations.nrows();
        if n < 2 {
            return Err(ClusterError::too_few("observations", 2, n));
        }
        if let Some(((row, col), _)) = observations.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ClusterError::NonFiniteValue { row, col });
        }

        let squared = self.linkage.squared();
        let mut dist = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let d2 = squared_euclidean(observations.row(i), observations.row(j));
                let d = if squared { d2 } else { d2.sqrt() };
                dist[[i, j]] = d;
                dist[[j, i]] = d;
            }
        }

        // Slot `i` holds the cluster currently stored at row/column `i`
        let mut active = vec![true; n];
        let mut node_id: Vec<usize> = (0..n).collect();
        let mut sizes = vec![1usize; n];
        let mut merges = Vec::with_capacity(n - 1);

        for step in 0..(n - 1) {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in (0..n).filter(|&i| active[i]) {
                for j in ((i + 1)..n).filter(|&j| active[j]) {
                    let d = dist[[i, j]];
                    if best.map_or(true, |(_, _, b)| d < b) {
                        best = Some((i, j, d));
                    }
                }
            }
            let Some((i, j, d_ij)) = best else {
                return Err(ClusterError::Other(format!(
                    "No mergeable pair left at step {step}"
                )));
            };

            let height = if squared { d_ij.max(0.0).sqrt() } else { d_ij };
            let (left, right) = if node_id[i] < node_id[j] {
                (node_id[i], node_id[j])
            } else {
                (node_id[j], node_id[i])
            };
            let (n_i, n_j) = (sizes[i] as f64, sizes[j] as f64);

            for k in (0..n).filter(|&k| active[k] && k != i && k != j) {
                let updated = self.linkage.update(
                    dist[[i, k]],
                    dist[[j, k]],
                    d_ij,
                    n_i,
                    n_j,
                    sizes[k] as f64,
                );
                let updated = if squared { updated.max(0.0) } else { updated };
                dist[[i, k]] = updated;
                dist[[k, i]] = updated;
            }

            active[j] = false;
            sizes[i] += sizes[j];
            node_id[i] = n + step;
            merges.push(Merge {
                left,
                right,
                height,
                size: sizes[i],
            });
        }

        log::debug!(
            "Clustered {n} observations with {} linkage ({} merges)",
            self.linkage,
            merges.len()
        );

        Ok(MergeTree {
            linkage: self.linkage,
            leaf_count: n,
            merges,
        })
    }
}

fn squared_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance between two observation rows
pub fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}
