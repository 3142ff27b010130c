use crate::error::{ClusterError, Result};
use crate::linkage::euclidean;
use ndarray::Array2;
use std::collections::HashMap;

/// What to do when the quality score is undefined for a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreGuard {
    /// Report 0.0 and keep going
    Fallback,
    /// Surface the error to the caller
    Propagate,
}

/// Mean silhouette coefficient of `labels` over the rows of `observations`,
/// using Euclidean distance between rows. Lies in `[-1, 1]`.
///
/// Labels need not be dense; only equality between them matters.
/// Undefined unless the number of distinct labels is in `2..=n-1`.
/// Members of singleton clusters score 0.
pub fn silhouette(observations: &Array2<f64>, labels: &[usize]) -> Result<f64> {
    let n = observations.nrows();
    if labels.len() != n {
        return Err(ClusterError::DimensionMismatch {
            expected: n,
            actual: labels.len(),
        });
    }

    let mut dense: HashMap<usize, usize> = HashMap::new();
    let labels: Vec<usize> = labels
        .iter()
        .map(|&label| {
            let next = dense.len();
            *dense.entry(label).or_insert(next)
        })
        .collect();
    let cluster_count = dense.len();
    let mut sizes = vec![0usize; cluster_count];
    for &label in &labels {
        sizes[label] += 1;
    }
    let distinct = cluster_count;
    if distinct < 2 || distinct >= n {
        return Err(ClusterError::UndefinedQuality(format!(
            "{distinct} distinct labels for {n} samples (need 2..={})",
            n.saturating_sub(1)
        )));
    }

    let mut total = 0.0;
    for i in 0..n {
        let mut sums = vec![0.0f64; cluster_count];
        for j in 0..n {
            if i != j {
                sums[labels[j]] += euclidean(observations.row(i), observations.row(j));
            }
        }

        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..cluster_count)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Ok(total / n as f64)
}

/// [`silhouette`] with the failure handling chosen by `guard`
pub fn score(observations: &Array2<f64>, labels: &[usize], guard: ScoreGuard) -> Result<f64> {
    match (silhouette(observations, labels), guard) {
        (Ok(score), _) => Ok(score),
        (Err(err), ScoreGuard::Fallback) => {
            log::warn!("Quality score unavailable, using 0.0: {err}");
            Ok(0.0)
        }
        (Err(err), ScoreGuard::Propagate) => Err(err),
    }
}
