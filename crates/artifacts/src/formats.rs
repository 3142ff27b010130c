use crate::error::{ArtifactError, Result};
use boundary_cluster::{EmbeddedItem, EmbeddingSet, Linkage, TraceMap};
use serde::de::{DeserializeOwned, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;

/// Embedding file as produced by the embedding generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingFile {
    #[serde(alias = "linkageType")]
    pub linkage_method: String,
    #[serde(alias = "features", alias = "entities", alias = "traces")]
    pub items: Vec<EmbeddingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingEntry {
    #[serde(alias = "signature")]
    pub name: String,
    pub code_vector: Vec<f64>,
    #[serde(default, alias = "translationID", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<i64>,
}

impl EmbeddingFile {
    pub fn into_set(self) -> std::result::Result<EmbeddingSet, boundary_cluster::ClusterError> {
        let linkage: Linkage = self.linkage_method.parse()?;
        Ok(EmbeddingSet {
            linkage,
            items: self
                .items
                .into_iter()
                .map(|entry| EmbeddedItem {
                    name: entry.name,
                    vector: entry.code_vector,
                    external_id: entry.external_id,
                })
                .collect(),
        })
    }
}

/// Entity translation table. Only its keys matter here: they are the entity
/// universe, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    keys: Vec<String>,
}

impl Translation {
    pub fn entity_count(&self) -> usize {
        self.keys.len()
    }

    pub fn entities(&self) -> &[String] {
        &self.keys
    }
}

impl<'de> Deserialize<'de> for Translation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeysVisitor;

        impl<'de> Visitor<'de> for KeysVisitor {
            type Value = Translation;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a translation object")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Translation, A::Error> {
                let mut keys = Vec::new();
                while let Some((key, IgnoredAny)) = access.next_entry::<String, IgnoredAny>()? {
                    keys.push(key);
                }
                Ok(Translation { keys })
            }
        }

        deserializer.deserialize_map(KeysVisitor)
    }
}

/// Read and parse a JSON artifact, distinguishing missing from malformed files.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    serde_json::from_slice(&bytes).map_err(|err| ArtifactError::malformed(path, err.to_string()))
}

/// Write pretty JSON through a temp file so readers never see a partial artifact.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &data)?;
    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    log::debug!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

pub fn load_traces(path: &Path) -> Result<TraceMap> {
    read_json(path)
}

pub fn load_embeddings(path: &Path) -> Result<EmbeddingSet> {
    let file: EmbeddingFile = read_json(path)?;
    file.into_set()
        .map_err(|err| ArtifactError::malformed(path, err.to_string()))
}

pub fn load_translation(path: &Path) -> Result<Translation> {
    read_json(path)
}
