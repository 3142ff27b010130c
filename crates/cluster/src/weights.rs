use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};

/// Weights of the three access-trace metrics combined into one similarity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub access: f64,
    pub read_write: f64,
    pub sequence: f64,
}

impl SimilarityWeights {
    pub fn new(access: f64, read_write: f64, sequence: f64) -> Result<Self> {
        let weights = Self {
            access,
            read_write,
            sequence,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("access", self.access),
            ("read_write", self.read_write),
            ("sequence", self.sequence),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ClusterError::NegativeWeight { name, value });
            }
        }
        Ok(())
    }

    /// Upper bound of any off-diagonal similarity under these weights
    pub fn total(&self) -> f64 {
        self.access + self.read_write + self.sequence
    }

    /// Percentages (0..=100) scaled down to fractions
    pub fn from_percentages(percentages: [u32; 3]) -> Self {
        Self {
            access: f64::from(percentages[0]) / 100.0,
            read_write: f64::from(percentages[1]) / 100.0,
            sequence: f64::from(percentages[2]) / 100.0,
        }
    }
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            access: 1.0 / 3.0,
            read_write: 1.0 / 3.0,
            sequence: 1.0 / 3.0,
        }
    }
}

/// Percentage weight triples summing to 100, walked from access-heavy down:
/// `[100,0,0], [90,10,0], [90,0,10], [80,20,0], [80,10,10], ...`
#[derive(Debug, Clone)]
pub struct WeightGrid {
    step: u32,
}

pub const DEFAULT_WEIGHT_STEP: u32 = 10;
const WEIGHT_INTERVAL: u32 = 100;

impl WeightGrid {
    pub fn new(step: u32) -> Result<Self> {
        if step == 0 || WEIGHT_INTERVAL % step != 0 {
            return Err(ClusterError::Other(format!(
                "Weight step must divide {WEIGHT_INTERVAL}, got {step}"
            )));
        }
        Ok(Self { step })
    }

    pub fn combinations(&self) -> Vec<[u32; 3]> {
        let mut out = Vec::new();
        let mut access = WEIGHT_INTERVAL;
        loop {
            let remainder = WEIGHT_INTERVAL - access;
            let mut read_write = remainder;
            loop {
                out.push([access, read_write, remainder - read_write]);
                if read_write < self.step {
                    break;
                }
                read_write -= self.step;
            }
            if access < self.step {
                break;
            }
            access -= self.step;
        }
        out
    }
}

impl Default for WeightGrid {
    fn default() -> Self {
        Self {
            step: DEFAULT_WEIGHT_STEP,
        }
    }
}

/// `80` -> `"80"`, used in matrix names like `dendrogram,80,10,10`
pub fn weights_label(percentages: [u32; 3]) -> String {
    percentages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
