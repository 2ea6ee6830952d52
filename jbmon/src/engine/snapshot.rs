//! Point-in-time copy of every record in a registry.

use super::record::MetricsRecord;
use super::registry::KeyRegistry;
use crate::domain::InstrumentationKey;

/// Independent copy of all records, sorted by key
///
/// Taking a snapshot never resets or blocks the live records beyond the time
/// needed to copy each one under its own lock.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    entries: Vec<(InstrumentationKey, MetricsRecord)>,
}

impl Snapshot {
    pub(crate) fn capture(registry: &KeyRegistry) -> Self {
        let mut entries: Vec<_> = registry
            .handles()
            .into_iter()
            .map(|(key, handle)| (key, handle.metrics()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    /// Build a snapshot from already-copied records (sorted on the way in)
    #[must_use]
    pub fn from_entries(mut entries: Vec<(InstrumentationKey, MetricsRecord)>) -> Self {
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    /// Record of `key`, if it existed when the snapshot was taken
    #[must_use]
    pub fn get(&self, key: &InstrumentationKey) -> Option<&MetricsRecord> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(InstrumentationKey, MetricsRecord)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn entries(&self) -> &[(InstrumentationKey, MetricsRecord)] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = (InstrumentationKey, MetricsRecord);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_is_sorted_and_detached() {
        let registry = KeyRegistry::new();
        let b = InstrumentationKey::new(200, 1, "av_packet_ref");
        let a = InstrumentationKey::new(100, 2, "av_packet_alloc");
        registry.get_or_create(&b);
        registry.get_or_create(&a).update(|state| state.metrics.packet_count = 3);

        let snapshot = Snapshot::capture(&registry);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.entries()[0].0, a);
        assert_eq!(snapshot.entries()[1].0, b);

        registry.get_or_create(&a).update(|state| state.metrics.packet_count = 99);
        assert_eq!(snapshot.get(&a).map(|r| r.packet_count), Some(3));
    }

    #[test]
    fn test_get_missing_key() {
        let snapshot = Snapshot::from_entries(vec![(
            InstrumentationKey::new(1, 1, "x"),
            MetricsRecord::new(),
        )]);
        assert!(snapshot.get(&InstrumentationKey::new(1, 1, "y")).is_none());
    }
}
