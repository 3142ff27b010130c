use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Need at least {required} {what}, got {actual}")]
    TooFewItems {
        what: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Non-finite value at row {row}, column {col}")]
    NonFiniteValue { row: usize, col: usize },

    #[error("Unknown linkage method: {0}")]
    UnknownLinkage(String),

    #[error("Unknown cut type: {0}")]
    UnknownCutType(String),

    #[error("Invalid cut value: {0}")]
    InvalidCut(String),

    #[error("Requested {requested} clusters but only {leaves} leaves exist")]
    TooManyClusters { requested: usize, leaves: usize },

    #[error("Quality score undefined: {0}")]
    UndefinedQuality(String),

    #[error("Weight '{name}' must be non-negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },

    #[error("Number of entities is too small ({0}, need at least 4)")]
    TooFewEntities(usize),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Other(String),
}

impl ClusterError {
    pub fn too_few(what: &'static str, required: usize, actual: usize) -> Self {
        Self::TooFewItems {
            what,
            required,
            actual,
        }
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }
}
