use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Mode of a single entity access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    #[serde(rename = "R")]
    Read,
    #[serde(rename = "W")]
    Write,
}

impl AccessMode {
    pub const fn as_char(self) -> char {
        match self {
            AccessMode::Read => 'R',
            AccessMode::Write => 'W',
        }
    }
}

/// One access event: `[entityName, modeChar]` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, AccessMode)", into = "(String, AccessMode)")]
pub struct Access {
    pub entity: String,
    pub mode: AccessMode,
}

impl Access {
    pub fn new(entity: impl Into<String>, mode: AccessMode) -> Self {
        Self {
            entity: entity.into(),
            mode,
        }
    }
}

impl From<(String, AccessMode)> for Access {
    fn from((entity, mode): (String, AccessMode)) -> Self {
        Self { entity, mode }
    }
}

impl From<Access> for (String, AccessMode) {
    fn from(access: Access) -> Self {
        (access.entity, access.mode)
    }
}

/// Ordered access sequence recorded for one controller/feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerTrace {
    pub controller: String,
    pub accesses: Vec<Access>,
}

/// Controller name -> ordered accesses, in the order the controllers were recorded.
///
/// Serialized as a JSON object; key order is preserved on both sides because
/// entity discovery order drives matrix row order downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceMap {
    traces: Vec<ControllerTrace>,
}

impl TraceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append accesses for a controller, merging into an existing entry of the same name.
    pub fn push(&mut self, controller: impl Into<String>, accesses: Vec<Access>) {
        let controller = controller.into();
        if let Some(existing) = self.traces.iter_mut().find(|t| t.controller == controller) {
            existing.accesses.extend(accesses);
        } else {
            self.traces.push(ControllerTrace {
                controller,
                accesses,
            });
        }
    }

    pub fn get(&self, controller: &str) -> Option<&ControllerTrace> {
        self.traces.iter().find(|t| t.controller == controller)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerTrace> {
        self.traces.iter()
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

impl Serialize for TraceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.traces.len()))?;
        for trace in &self.traces {
            map.serialize_entry(&trace.controller, &trace.accesses)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TraceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TraceMapVisitor;

        impl<'de> Visitor<'de> for TraceMapVisitor {
            type Value = TraceMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of controller name to [entity, mode] pairs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TraceMap, A::Error> {
                let mut traces = TraceMap::new();
                while let Some((controller, accesses)) =
                    access.next_entry::<String, Vec<Access>>()?
                {
                    traces.push(controller, accesses);
                }
                Ok(traces)
            }
        }

        deserializer.deserialize_map(TraceMapVisitor)
    }
}

/// A group of members sharing one cluster label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster<T> {
    pub id: String,
    pub members: Vec<T>,
}

/// Flat partition: cluster id -> ordered members, clusters kept in label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<T> {
    clusters: Vec<Cluster<T>>,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
        }
    }
}

impl<T> Partition<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group `items` by `labels` (one label per item). Cluster ids are the label
    /// numbers rendered as strings, ordered by first appearance.
    pub fn from_labels(labels: &[usize], items: impl IntoIterator<Item = T>) -> Self {
        let mut partition = Self::new();
        for (&label, item) in labels.iter().zip(items) {
            partition.insert(&label.to_string(), item);
        }
        partition
    }

    /// Add an empty cluster if `id` is not present yet.
    pub fn ensure_cluster(&mut self, id: &str) -> &mut Cluster<T> {
        let pos = match self.clusters.iter().position(|c| c.id == id) {
            Some(pos) => pos,
            None => {
                self.clusters.push(Cluster {
                    id: id.to_string(),
                    members: Vec::new(),
                });
                self.clusters.len() - 1
            }
        };
        &mut self.clusters[pos]
    }

    pub fn insert(&mut self, id: &str, member: T) {
        self.ensure_cluster(id).members.push(member);
    }

    pub fn get(&self, id: &str) -> Option<&[T]> {
        self.clusters
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.members.as_slice())
    }

    pub fn clusters(&self) -> &[Cluster<T>] {
        &self.clusters
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.clusters.iter().map(|c| c.id.as_str())
    }

    /// Number of clusters, including empty ones
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn non_empty_count(&self) -> usize {
        self.clusters.iter().filter(|c| !c.members.is_empty()).count()
    }

    pub fn member_count(&self) -> usize {
        self.clusters.iter().map(|c| c.members.len()).sum()
    }

    pub fn map_members<U>(self, mut f: impl FnMut(T) -> U) -> Partition<U> {
        Partition {
            clusters: self
                .clusters
                .into_iter()
                .map(|c| Cluster {
                    id: c.id,
                    members: c.members.into_iter().map(&mut f).collect(),
                })
                .collect(),
        }
    }
}

impl<T: Serialize> Serialize for Partition<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.clusters.len()))?;
        for cluster in &self.clusters {
            map.serialize_entry(&cluster.id, &cluster.members)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Partition<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PartitionVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for PartitionVisitor<T> {
            type Value = Partition<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of cluster id to member list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut partition = Partition::new();
                while let Some((id, members)) = access.next_entry::<String, Vec<T>>()? {
                    partition.ensure_cluster(&id).members.extend(members);
                }
                Ok(partition)
            }
        }

        deserializer.deserialize_map(PartitionVisitor(PhantomData))
    }
}

/// Cluster result handed to visualization tooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult<T> {
    #[serde(rename = "qualityScore", with = "two_decimals")]
    pub quality_score: f64,
    pub clusters: Partition<T>,
}

/// Scores travel as strings with two decimals (`"0.42"`).
mod two_decimals {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:.2}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(D::Error::custom)
    }
}
