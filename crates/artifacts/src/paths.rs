use boundary_cluster::CutKey;
use std::path::{Path, PathBuf};

pub const DATAFILE_NAME: &str = "datafile.json";
pub const TRANSLATION_NAME: &str = "translation.json";
pub const FEATURES_EMBEDDINGS_NAME: &str = "features_embeddings.json";
pub const ENTITIES_EMBEDDINGS_NAME: &str = "entities_embeddings.json";
pub const TRACES_EMBEDDINGS_NAME: &str = "entities_traces_embeddings.json";
pub const CLUSTERS_NAME: &str = "clusters.json";
pub const DENDROGRAM_NAME: &str = "dendrogram.json";
pub const WEIGHT_SWEEP_NAME: &str = "weight_sweep.json";

const ANALYSER_DIR_NAME: &str = "analyser";

/// Where one codebase keeps its inputs and results under the codebases root:
///
/// ```text
/// <root>/<codebase>/datafile.json
/// <root>/<codebase>/<dendrogram>/dendrogram.json
/// <root>/<codebase>/<dendrogram>/weight_sweep.json
/// <root>/<codebase>/<dendrogram>/<graph>/clusters.json
/// <root>/<codebase>/analyser/entities/cuts/<linkage>,<size>.json
/// ```
#[derive(Debug, Clone)]
pub struct CodebaseLayout {
    dir: PathBuf,
}

impl CodebaseLayout {
    pub fn new(codebases_root: &Path, codebase: &str) -> Self {
        Self {
            dir: codebases_root.join(codebase),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn datafile(&self) -> PathBuf {
        self.dir.join(DATAFILE_NAME)
    }

    pub fn translation(&self) -> PathBuf {
        self.dir.join(TRANSLATION_NAME)
    }

    pub fn features_embeddings(&self) -> PathBuf {
        self.dir.join(FEATURES_EMBEDDINGS_NAME)
    }

    pub fn entities_embeddings(&self) -> PathBuf {
        self.dir.join(ENTITIES_EMBEDDINGS_NAME)
    }

    pub fn traces_embeddings(&self) -> PathBuf {
        self.dir.join(TRACES_EMBEDDINGS_NAME)
    }

    pub fn dendrogram_dir(&self, dendrogram: &str) -> PathBuf {
        self.dir.join(dendrogram)
    }

    pub fn dendrogram_export(&self, dendrogram: &str) -> PathBuf {
        self.dendrogram_dir(dendrogram).join(DENDROGRAM_NAME)
    }

    pub fn weight_sweep(&self, dendrogram: &str) -> PathBuf {
        self.dendrogram_dir(dendrogram).join(WEIGHT_SWEEP_NAME)
    }

    pub fn clusters(&self, dendrogram: &str, graph: &str) -> PathBuf {
        self.dendrogram_dir(dendrogram).join(graph).join(CLUSTERS_NAME)
    }

    /// Names of decompositions (graph directories) already under `dendrogram`
    pub fn existing_graphs(&self, dendrogram: &str) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.dendrogram_dir(dendrogram)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    pub fn cuts_dir(&self) -> PathBuf {
        self.dir.join(ANALYSER_DIR_NAME).join("entities").join("cuts")
    }

    pub fn cut(&self, key: &CutKey) -> PathBuf {
        self.cuts_dir().join(format!("{key}.json"))
    }
}
