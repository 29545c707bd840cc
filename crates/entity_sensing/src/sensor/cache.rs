//! Per-sensor caches that live across ticks
//!
//! Both caches are keyed by entity handle and use ordered maps so encoded
//! state is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::foundation::collections::EntityHandle;

/// Cached verdict of the script filter for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    /// Whether the filter let the entity through
    pub accepted: bool,
    /// Whether the entity was a candidate this tick
    pub used: bool,
}

/// Filter verdicts, reaped once their entity stops being a candidate
///
/// Call [`begin_frame`](Self::begin_frame) before the narrow phase and
/// [`sweep`](Self::sweep) after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCache {
    entries: BTreeMap<EntityHandle, FilterEntry>,
}

impl FilterCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every entry unused
    pub fn begin_frame(&mut self) {
        for entry in self.entries.values_mut() {
            entry.used = false;
        }
    }

    /// Cached verdict for `entity`, marking it used
    pub fn lookup(&mut self, entity: EntityHandle) -> Option<bool> {
        self.entries.get_mut(&entity).map(|entry| {
            entry.used = true;
            entry.accepted
        })
    }

    /// Record a fresh verdict
    pub fn store(&mut self, entity: EntityHandle, accepted: bool) {
        self.entries.insert(entity, FilterEntry { accepted, used: true });
    }

    /// Restore an entry exactly as persisted
    pub fn insert_entry(&mut self, entity: EntityHandle, entry: FilterEntry) {
        self.entries.insert(entity, entry);
    }

    /// Drop entries not used since the last [`begin_frame`](Self::begin_frame);
    /// returns how many were removed
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.used);
        before - self.entries.len()
    }

    /// Whether the filter rejected `entity`
    pub fn is_rejected(&self, entity: EntityHandle) -> bool {
        self.entries.get(&entity).is_some_and(|entry| !entry.accepted)
    }

    /// Forget one entity
    pub fn remove(&mut self, entity: EntityHandle) -> Option<FilterEntry> {
        self.entries.remove(&entity)
    }

    /// All entries in handle order
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, FilterEntry)> + '_ {
        self.entries.iter().map(|(&handle, &entry)| (handle, entry))
    }

    /// Entities the filter rejected
    pub fn rejected(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.iter().filter(|(_, entry)| !entry.accepted).map(|(handle, _)| handle)
    }

    /// Number of cached verdicts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no verdicts are cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every verdict
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Start times of candidates still accruing detection delay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayTracker {
    started: BTreeMap<EntityHandle, f64>,
}

impl DelayTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start time for `entity`, starting its clock at `now` if it has none
    pub fn start_or_insert(&mut self, entity: EntityHandle, now: f64) -> f64 {
        *self.started.entry(entity).or_insert(now)
    }

    /// Set a start time explicitly
    pub fn insert(&mut self, entity: EntityHandle, started: f64) {
        self.started.insert(entity, started);
    }

    /// Stop tracking `entity`
    pub fn remove(&mut self, entity: EntityHandle) -> Option<f64> {
        self.started.remove(&entity)
    }

    /// Keep only entities for which `keep` returns `true`
    pub fn retain(&mut self, mut keep: impl FnMut(EntityHandle) -> bool) {
        self.started.retain(|&handle, _| keep(handle));
    }

    /// Whether `entity` is accruing delay
    pub fn contains(&self, entity: EntityHandle) -> bool {
        self.started.contains_key(&entity)
    }

    /// Entries in handle order
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, f64)> + '_ {
        self.started.iter().map(|(&handle, &started)| (handle, started))
    }

    /// Number of delayed entities
    pub fn len(&self) -> usize {
        self.started.len()
    }

    /// Whether nothing is delayed
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    /// Stop tracking everything
    pub fn clear(&mut self) {
        self.started.clear();
    }
}
