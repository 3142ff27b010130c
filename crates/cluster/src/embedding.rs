use crate::error::{ClusterError, Result};
use crate::linkage::Linkage;
use ndarray::Array2;

/// One embedded code element (feature, entity, or trace)
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedItem {
    pub name: String,
    pub vector: Vec<f64>,
    /// Identifier of the element outside the embedding file, when it has one
    pub external_id: Option<i64>,
}

/// Embedding vectors plus the linkage method they should be clustered with
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSet {
    pub linkage: Linkage,
    pub items: Vec<EmbeddedItem>,
}

impl EmbeddingSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }

    /// Stack the vectors into an `n x d` observation matrix
    pub fn matrix(&self) -> Result<Array2<f64>> {
        let Some(first) = self.items.first() else {
            return Err(ClusterError::too_few("embedded items", 2, 0));
        };
        let dim = first.vector.len();

        let mut values = Vec::with_capacity(self.items.len() * dim);
        for item in &self.items {
            if item.vector.len() != dim {
                return Err(ClusterError::DimensionMismatch {
                    expected: dim,
                    actual: item.vector.len(),
                });
            }
            values.extend_from_slice(&item.vector);
        }

        Array2::from_shape_vec((self.items.len(), dim), values)
            .map_err(|e| ClusterError::Other(format!("Failed to shape embedding matrix: {e}")))
    }
}

/// Short display name for a method signature: `a.b.Service.run(int)` -> `run`
pub fn short_signature(signature: &str) -> &str {
    let head = signature.split('(').next().unwrap_or(signature);
    head.rsplit('.').next().unwrap_or(head)
}
