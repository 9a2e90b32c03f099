//! Cache entries and the concurrent name → entry store

use crate::recorder::Dependencies;
use crate::resource::ResourceId;
use hotscript_vfs::Timestamp;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

/// One compiled script together with what it was compiled from.
///
/// Entries are immutable; a recompilation publishes a new entry.
#[derive(Debug)]
pub struct CacheEntry<U> {
    unit: Arc<U>,
    resource: ResourceId,
    primary_timestamp: Timestamp,
    dependencies: Dependencies,
    compiled_at: SystemTime,
}

impl<U> CacheEntry<U> {
    pub fn new(
        unit: Arc<U>,
        resource: ResourceId,
        primary_timestamp: Timestamp,
        dependencies: Dependencies,
    ) -> Self {
        Self {
            unit,
            resource,
            primary_timestamp,
            dependencies,
            compiled_at: SystemTime::now(),
        }
    }

    pub fn unit(&self) -> &Arc<U> {
        &self.unit
    }

    /// The resource the script was compiled from
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Modification timestamp of the script when it was compiled
    pub fn primary_timestamp(&self) -> Timestamp {
        self.primary_timestamp
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn compiled_at(&self) -> SystemTime {
        self.compiled_at
    }
}

/// Concurrent mapping from script name to its current entry
#[derive(Debug)]
pub struct EntryStore<U> {
    entries: RwLock<HashMap<String, Arc<CacheEntry<U>>>>,
}

impl<U> EntryStore<U> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<CacheEntry<U>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Install `entry` for `name`, returning the entry it replaced
    pub fn publish(&self, name: &str, entry: Arc<CacheEntry<U>>) -> Option<Arc<CacheEntry<U>>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), entry)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CacheEntry<U>>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl<U> Default for EntryStore<U> {
    fn default() -> Self {
        Self::new()
    }
}
