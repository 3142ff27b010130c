use anyhow::{Context, Result};
use boundary_cluster::{Linkage, SimilarityWeights};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const CODEBASES_PATH_ENV: &str = "BOUNDARY_CODEBASES_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "boundary.toml";
const DEFAULT_CODEBASES_PATH: &str = "codebases";

/// Effective settings for one invocation
#[derive(Clone, Debug)]
pub struct Settings {
    pub codebases_path: PathBuf,
    pub default_linkage: Linkage,
    pub weights: SimilarityWeights,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    codebases_path: Option<PathBuf>,
    default_linkage: Option<String>,
    weights: Option<FileWeights>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileWeights {
    access: Option<f64>,
    read_write: Option<f64>,
    sequence: Option<f64>,
}

impl Settings {
    /// Codebases path precedence: flag, `BOUNDARY_CODEBASES_PATH`, config file, default.
    ///
    /// An explicit `config_path` must exist; the implicit `./boundary.toml` is optional.
    pub fn resolve(flag_path: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) => load_file(path)?,
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.exists() {
                    load_file(implicit)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let codebases_path = flag_path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CODEBASES_PATH_ENV).map(PathBuf::from))
            .or(file.codebases_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CODEBASES_PATH));

        let default_linkage = match file.default_linkage.as_deref() {
            Some(raw) => raw.parse::<Linkage>().context("Invalid default_linkage in config")?,
            None => Linkage::Average,
        };

        let defaults = SimilarityWeights::default();
        let raw = file.weights.unwrap_or_default();
        let weights = SimilarityWeights::new(
            raw.access.unwrap_or(defaults.access),
            raw.read_write.unwrap_or(defaults.read_write),
            raw.sequence.unwrap_or(defaults.sequence),
        )
        .context("Invalid [weights] in config")?;

        log::debug!("Codebases path: {}", codebases_path.display());

        Ok(Self {
            codebases_path,
            default_linkage,
            weights,
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
}
