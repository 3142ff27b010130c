//! # Boundary Artifacts
//!
//! JSON artifacts exchanged with the trace collector, the embedding generator
//! and visualization tooling, plus the on-disk layout of a codebase.
//!
//! ## Layout
//!
//! ```text
//! <codebases>/<codebase>/
//!     ├─ datafile.json                      controller -> [[entity, mode], ...]
//!     ├─ translation.json                   entity universe (keys)
//!     ├─ features_embeddings.json           feature vectors
//!     ├─ entities_embeddings.json           entity vectors
//!     ├─ entities_traces_embeddings.json    trace vectors
//!     ├─ <dendrogram>/dendrogram.json       merge tree export
//!     ├─ <dendrogram>/weight_sweep.json     weight recommendation sweep
//!     ├─ <dendrogram>/<graph>/clusters.json cluster result
//!     └─ analyser/entities/cuts/<linkage>,<size>.json
//! ```

mod cut_cache;
mod dendrogram;
mod error;
mod formats;
mod paths;

pub use cut_cache::FileCutCache;
pub use dendrogram::DendrogramExport;
pub use error::{ArtifactError, Result};
pub use formats::{
    load_embeddings, load_traces, load_translation, read_json, write_json, EmbeddingEntry,
    EmbeddingFile, Translation,
};
pub use paths::{
    CodebaseLayout, CLUSTERS_NAME, DATAFILE_NAME, DENDROGRAM_NAME, ENTITIES_EMBEDDINGS_NAME,
    FEATURES_EMBEDDINGS_NAME, TRACES_EMBEDDINGS_NAME, TRANSLATION_NAME, WEIGHT_SWEEP_NAME,
};
