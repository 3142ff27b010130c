use crate::types::{AccessMode, TraceMap};
use serde::{Deserialize, Serialize};

/// Controllers that touched one entity, with the modes each used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerAccess {
    pub controller: String,
    /// Deduplicated, in order of first use
    pub modes: Vec<AccessMode>,
}

impl ControllerAccess {
    pub fn writes(&self) -> bool {
        self.modes.contains(&AccessMode::Write)
    }
}

/// Entity -> controllers accessing it. Entities are kept in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessProfile {
    entries: Vec<(String, Vec<ControllerAccess>)>,
}

impl AccessProfile {
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(entity, _)| entity.as_str())
    }

    pub fn controllers(&self, entity: &str) -> Option<&[ControllerAccess]> {
        self.entries
            .iter()
            .find(|(name, _)| name == entity)
            .map(|(_, controllers)| controllers.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ControllerAccess])> {
        self.entries
            .iter()
            .map(|(entity, controllers)| (entity.as_str(), controllers.as_slice()))
    }

    pub fn entity_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&mut self, entity: &str, controller: &str, mode: AccessMode) {
        let pos = match self.entries.iter().position(|(name, _)| name == entity) {
            Some(pos) => pos,
            None => {
                self.entries.push((entity.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };
        let controllers = &mut self.entries[pos].1;

        match controllers.iter_mut().find(|c| c.controller == controller) {
            Some(existing) => {
                if !existing.modes.contains(&mode) {
                    existing.modes.push(mode);
                }
            }
            None => controllers.push(ControllerAccess {
                controller: controller.to_string(),
                modes: vec![mode],
            }),
        }
    }
}

/// Folds access traces into an [`AccessProfile`].
///
/// A fresh aggregator is built per request; feeding several trace maps into one
/// aggregator accumulates them, it never forgets earlier input.
#[derive(Debug, Default)]
pub struct AccessAggregator {
    profile: AccessProfile,
}

impl AccessAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_traces(&mut self, traces: &TraceMap) -> &mut Self {
        for trace in traces.iter() {
            for access in &trace.accesses {
                self.profile
                    .record(&access.entity, &trace.controller, access.mode);
            }
        }
        self
    }

    pub fn finish(self) -> AccessProfile {
        log::debug!(
            "Aggregated access profile for {} entities",
            self.profile.entity_count()
        );
        self.profile
    }

    /// One-shot helper for a single trace map
    pub fn aggregate(traces: &TraceMap) -> AccessProfile {
        let mut aggregator = Self::new();
        aggregator.add_traces(traces);
        aggregator.finish()
    }
}
