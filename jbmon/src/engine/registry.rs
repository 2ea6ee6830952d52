//! Key registry: owns one [`RecordHandle`] per aggregation key.
//!
//! Backed by a sharded `DashMap`, so first access to one key only locks the
//! shard holding it. Records are never removed within a session.

use dashmap::DashMap;
use log::debug;

use super::record::RecordHandle;
use crate::domain::InstrumentationKey;

#[derive(Debug, Default)]
pub struct KeyRegistry {
    records: DashMap<InstrumentationKey, RecordHandle>,
}

impl KeyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `key`, creating a fresh record if the key is new
    ///
    /// When several threads race on the first access to the same key, the
    /// shard's entry lock lets exactly one insert win and every caller gets a
    /// clone of that winner.
    pub fn get_or_create(&self, key: &InstrumentationKey) -> RecordHandle {
        // Fast path without cloning the key
        if let Some(handle) = self.records.get(key) {
            return handle.value().clone();
        }

        self.records
            .entry(key.clone())
            .or_insert_with(|| {
                debug!("new aggregation key: {key}");
                RecordHandle::new()
            })
            .value()
            .clone()
    }

    /// Handle for `key` if it was ever entered
    #[must_use]
    pub fn get(&self, key: &InstrumentationKey) -> Option<RecordHandle> {
        self.records.get(key).map(|handle| handle.value().clone())
    }

    /// Clone every (key, handle) pair
    ///
    /// Each shard is read-locked only while its own entries are cloned.
    #[must_use]
    pub fn handles(&self) -> Vec<(InstrumentationKey, RecordHandle)> {
        self.records.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
