//! # Boundary Cluster
//!
//! Service boundary discovery through clustering of runtime access traces.
//!
//! ## Features
//!
//! - **Access profiling** - fold controller traces into per-entity access profiles
//! - **Custom similarity** - weighted access, read/write and sequence affinity
//! - **Agglomerative clustering** - single/complete/average/weighted/centroid/median/ward
//! - **Tree cuts** - by height threshold or by target cluster count
//! - **Entity attribution** - move entities onto feature clusters by majority access
//! - **Granularity search** - grow cluster counts until a plausibility ceiling
//!
//! ## Architecture
//!
//! ```text
//! TraceMap
//!     │
//!     ├──> AccessAggregator ──> AccessProfile
//!     │                            │
//!     ├──> SimilarityMatrixBuilder <┘ (weights)
//!     │
//!     ├──> HierarchicalClusterer (rows = observations) ──> MergeTree
//!     │
//!     ├──> TreeCutter (height | count) ──> labels ──> Partition
//!     │                                       │
//!     │      EntityClusterAssigner (features) ┘
//!     │
//!     └──> silhouette quality ──> ClusterResult
//! ```

mod access;
mod assign;
mod cut;
mod embedding;
mod error;
mod granularity;
mod linkage;
mod pipeline;
mod quality;
mod similarity;
mod types;
mod weights;

pub use access::{AccessAggregator, AccessProfile, ControllerAccess};
pub use assign::{EntityClusterAssigner, DEFAULT_CLUSTER};
pub use cut::{Cut, CutType, TreeCutter};
pub use embedding::{short_signature, EmbeddedItem, EmbeddingSet};
pub use error::{ClusterError, Result};
pub use granularity::{
    entity_ceiling, Attempt, CutCache, CutKey, CutOutcome, GranularityCut, GranularityReport,
    GranularitySearch, MemoryCutCache,
};
pub use linkage::{euclidean, HierarchicalClusterer, Linkage, Merge, MergeTree};
pub use pipeline::{
    decompose_by_similarity, decompose_features, decompose_traces_to_entities, sweep_weights,
    Decomposition, SweepEntry,
};
pub use quality::{score, silhouette, ScoreGuard};
pub use similarity::{SimilarityMatrix, SimilarityMatrixBuilder};
pub use types::{
    Access, AccessMode, Cluster, ClusterResult, ControllerTrace, Partition, TraceMap,
};
pub use weights::{weights_label, SimilarityWeights, WeightGrid, DEFAULT_WEIGHT_STEP};
