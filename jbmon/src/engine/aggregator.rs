//! Folding observations into a [`MetricsRecord`].
//!
//! Pure functions over a record the caller already holds exclusively (the
//! session calls them under the record lock). Counters saturate instead of
//! wrapping.

use super::event::ExitObservation;
use super::policy::ObservationPolicy;
use super::record::MetricsRecord;

/// Fold one latency sample into total/min/max
///
/// Zero-length samples carry no information and are ignored.
pub fn record_latency_sample(record: &mut MetricsRecord, elapsed_ns: u64) {
    if elapsed_ns == 0 {
        return;
    }
    record.total_delay_ns = record.total_delay_ns.saturating_add(elapsed_ns);
    record.min_delay_ns = record.min_delay_ns.min(elapsed_ns);
    record.max_delay_ns = record.max_delay_ns.max(elapsed_ns);
}

/// Count one unit of work, its bytes and, on failure, a drop
pub fn record_unit_of_work(record: &mut MetricsRecord, byte_size: u64, succeeded: bool) {
    record.packet_count = record.packet_count.saturating_add(1);
    record.total_bytes = record.total_bytes.saturating_add(byte_size);
    if !succeeded {
        record_failure(record);
    }
}

/// Count a drop without counting work
pub fn record_failure(record: &mut MetricsRecord) {
    record.dropped_packets = record.dropped_packets.saturating_add(1);
}

/// Apply everything one exit event contributes under `policy`
///
/// `elapsed_ns` is the paired latency, `None` when pairing produced no
/// positive sample. The work, byte and drop counters update either way.
pub fn fold_exit(
    record: &mut MetricsRecord,
    elapsed_ns: Option<u64>,
    policy: &ObservationPolicy,
    observation: &ExitObservation,
) {
    let succeeded = policy.outcome.succeeded(observation.outcome_code);

    if policy.counts_work {
        let bytes = if policy.byte_size { observation.byte_size.unwrap_or(0) } else { 0 };
        record_unit_of_work(record, bytes, succeeded);
    } else if !succeeded {
        record_failure(record);
    }

    if let Some(elapsed) = elapsed_ns {
        record_latency_sample(record, elapsed);
    }
}
