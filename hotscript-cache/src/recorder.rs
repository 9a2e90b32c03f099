//! Dependency recording for a single compilation

use crate::resource::ResourceId;
use hotscript_vfs::Timestamp;
use std::collections::BTreeMap;

/// Flat set of resources observed while producing one compiled unit
pub type Dependencies = BTreeMap<ResourceId, Timestamp>;

/// Accumulates `(resource, timestamp)` observations for one compilation.
///
/// A recorder is owned by exactly one [`CompileContext`](crate::CompileContext)
/// and never shared. When the same resource is observed more than once the
/// earliest timestamp is kept, so a change made during compilation still
/// marks the result stale.
#[derive(Debug, Default, Clone)]
pub struct DependencyRecorder {
    observed: Dependencies,
}

impl DependencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: ResourceId, timestamp: Timestamp) {
        self.observed
            .entry(id)
            .and_modify(|seen| *seen = (*seen).min(timestamp))
            .or_insert(timestamp);
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.observed.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Dependencies {
        self.observed.clone()
    }

    pub fn into_dependencies(self) -> Dependencies {
        self.observed
    }
}
