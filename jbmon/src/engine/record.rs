//! Per-key statistics record and the shared handle the registry hands out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Initial `min_delay_ns`: no latency sample folded in yet
pub const NO_SAMPLES: u64 = u64::MAX;

/// Running statistics of one aggregation key
///
/// Counters only grow (saturating at `u64::MAX`). Before the first latency
/// sample `min_delay_ns` holds [`NO_SAMPLES`] and `max_delay_ns` is 0; after
/// it, `min_delay_ns <= max_delay_ns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsRecord {
    /// Completed units of work (packets or frames)
    pub packet_count: u64,
    /// Sum of entry→exit delays
    pub total_delay_ns: u64,
    /// Smallest delay, [`NO_SAMPLES`] until the first sample
    pub min_delay_ns: u64,
    /// Largest delay
    pub max_delay_ns: u64,
    /// Reserved for a buffer occupancy gauge, always 0
    pub buffer_size: u64,
    /// Units of work whose outcome was a failure
    pub dropped_packets: u64,
    /// Sum of byte sizes of units of work
    pub total_bytes: u64,
    /// Timestamp of the most recent entry (pairing state)
    pub last_timestamp_ns: u64,
}

impl Default for MetricsRecord {
    fn default() -> Self {
        Self {
            packet_count: 0,
            total_delay_ns: 0,
            min_delay_ns: NO_SAMPLES,
            max_delay_ns: 0,
            buffer_size: 0,
            dropped_packets: 0,
            total_bytes: 0,
            last_timestamp_ns: 0,
        }
    }
}

impl MetricsRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once at least one latency sample was folded in
    #[must_use]
    pub fn has_latency_samples(&self) -> bool {
        self.min_delay_ns != NO_SAMPLES
    }

    /// Minimum delay, `None` while the sentinel is in place
    #[must_use]
    pub fn min_delay_ns(&self) -> Option<u64> {
        self.has_latency_samples().then_some(self.min_delay_ns)
    }

    /// Maximum delay, `None` before the first sample
    #[must_use]
    pub fn max_delay_ns(&self) -> Option<u64> {
        self.has_latency_samples().then_some(self.max_delay_ns)
    }

    /// Total delay divided by packet count, as published by the exporter
    ///
    /// `None` for functions that count no work (latency-only call sites).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_delay_ns(&self) -> Option<f64> {
        (self.packet_count > 0 && self.total_delay_ns > 0)
            .then(|| self.total_delay_ns as f64 / self.packet_count as f64)
    }
}

/// Everything guarded by one record lock: the statistics plus the pairing
/// state a [`PairingStrategy`](super::PairingStrategy) may keep beyond
/// `last_timestamp_ns`
#[derive(Debug, Default)]
pub struct RecordState {
    pub metrics: MetricsRecord,
    /// Entry timestamps of calls still in flight (call-stack pairing only)
    pub open_calls: VecDeque<u64>,
}

/// Stable, shared handle to one key's record
///
/// Clones refer to the same record. Every update runs under the record's own
/// lock, so updates to one key are atomic and never contend with other keys.
#[derive(Debug, Clone, Default)]
pub struct RecordHandle(Arc<Mutex<RecordState>>);

impl RecordHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the record
    ///
    /// A panic in a previous holder leaves plain counters behind, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn update<R>(&self, f: impl FnOnce(&mut RecordState) -> R) -> R {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Copy of the current statistics
    #[must_use]
    pub fn metrics(&self) -> MetricsRecord {
        self.update(|state| state.metrics)
    }

    /// Returns true if both handles point at the same record
    #[must_use]
    pub fn same_record(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_holds_sentinels() {
        let record = MetricsRecord::new();
        assert_eq!(record.min_delay_ns, NO_SAMPLES);
        assert_eq!(record.max_delay_ns, 0);
        assert_eq!(record.packet_count, 0);
        assert_eq!(record.buffer_size, 0);
        assert!(!record.has_latency_samples());
        assert_eq!(record.min_delay_ns(), None);
        assert_eq!(record.max_delay_ns(), None);
    }

    #[test]
    fn test_average_requires_packets() {
        let mut record = MetricsRecord::new();
        record.total_delay_ns = 900;
        assert_eq!(record.average_delay_ns(), None);

        record.packet_count = 3;
        assert_eq!(record.average_delay_ns(), Some(300.0));
    }

    #[test]
    fn test_handle_clones_share_record() {
        let handle = RecordHandle::new();
        let clone = handle.clone();
        clone.update(|state| state.metrics.packet_count += 1);

        assert_eq!(handle.metrics().packet_count, 1);
        assert!(handle.same_record(&clone));
        assert!(!handle.same_record(&RecordHandle::new()));
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let handle = RecordHandle::new();
        let poisoner = handle.clone();
        let _ = std::thread::spawn(move || {
            poisoner.update(|state| {
                state.metrics.packet_count = 5;
                panic!("poison the record lock");
            });
        })
        .join();

        assert_eq!(handle.metrics().packet_count, 5);
    }
}
