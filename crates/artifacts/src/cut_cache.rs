use crate::error::ArtifactError;
use crate::formats::{read_json, write_json};
use crate::paths::CodebaseLayout;
use boundary_cluster::{ClusterError, CutCache, CutKey, GranularityCut, Result};
use std::path::PathBuf;

/// Granularity cuts stored as `<linkage>,<size>.json` under the codebase's
/// analyser directory. Existence of the file is what counts as cached.
#[derive(Debug, Clone)]
pub struct FileCutCache {
    layout: CodebaseLayout,
}

impl FileCutCache {
    pub fn new(layout: CodebaseLayout) -> Self {
        Self { layout }
    }

    pub fn path(&self, key: &CutKey) -> PathBuf {
        self.layout.cut(key)
    }
}

fn to_cluster_error(err: ArtifactError) -> ClusterError {
    ClusterError::cache(err.to_string())
}

impl CutCache for FileCutCache {
    fn contains(&self, key: &CutKey) -> Result<bool> {
        let exists = self.path(key).exists();
        if exists {
            log::debug!("Cut cache hit for {key}");
        }
        Ok(exists)
    }

    fn load(&self, key: &CutKey) -> Result<Option<GranularityCut>> {
        match read_json(&self.path(key)) {
            Ok(cut) => Ok(Some(cut)),
            Err(ArtifactError::NotFound(_)) => Ok(None),
            Err(err) => Err(to_cluster_error(err)),
        }
    }

    fn store(&mut self, key: &CutKey, cut: &GranularityCut) -> Result<()> {
        write_json(&self.path(key), cut).map_err(to_cluster_error)
    }
}
