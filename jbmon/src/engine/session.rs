//! Monitoring session: the owner of one registry and its configuration.
//!
//! The host constructs a [`Session`], feeds it events from any number of
//! threads, takes snapshots whenever it likes and drops it at the end. There
//! is no process-wide state; two sessions never share records.

use log::{debug, trace};

use super::aggregator;
use super::event::{ExitObservation, ProbeEvent};
use super::pairing::{PairingMode, PairingStrategy};
use super::policy::{ObservationPolicy, PolicyTable};
use super::registry::KeyRegistry;
use super::snapshot::Snapshot;
use crate::domain::InstrumentationKey;

/// Receives every raw event before it is folded
///
/// Installed with [`Session::set_event_sink`]; a session has none by default.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &ProbeEvent);
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn record(&self, event: &ProbeEvent) {
        (**self).record(event);
    }
}

/// Startup configuration of a session, immutable once the session exists
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub policies: PolicyTable,
    pub pairing: PairingMode,
}

pub struct Session {
    registry: KeyRegistry,
    policies: PolicyTable,
    pairing: Box<dyn PairingStrategy>,
    sink: Option<Box<dyn EventSink>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_strategy(config.policies, config.pairing.strategy())
    }

    /// Session with a caller-supplied pairing strategy
    #[must_use]
    pub fn with_strategy(policies: PolicyTable, pairing: Box<dyn PairingStrategy>) -> Self {
        debug!(
            "session: pairing={}, {} function policies",
            pairing.name(),
            policies.len()
        );
        Self { registry: KeyRegistry::new(), policies, pairing, sink: None }
    }

    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = Some(sink);
    }

    #[must_use]
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    #[must_use]
    pub fn pairing(&self) -> &dyn PairingStrategy {
        self.pairing.as_ref()
    }

    /// A function started: create the key if needed and mark the entry
    pub fn on_entry(&self, key: &InstrumentationKey, timestamp_ns: u64) {
        if let Some(sink) = &self.sink {
            sink.record(&ProbeEvent::entry(key.clone(), timestamp_ns));
        }
        self.registry
            .get_or_create(key)
            .update(|state| self.pairing.on_entry(state, timestamp_ns));
    }

    /// A function returned: fold it under the policy table's rule for it
    ///
    /// Exits of keys that never saw an entry are ignored.
    pub fn on_exit(&self, key: &InstrumentationKey, timestamp_ns: u64, observation: ExitObservation) {
        let policy = self.policies.lookup(&key.function);
        self.on_exit_with(key, timestamp_ns, observation, &policy);
    }

    /// [`Self::on_exit`] with an explicit policy instead of the table's
    pub fn on_exit_with(
        &self,
        key: &InstrumentationKey,
        timestamp_ns: u64,
        observation: ExitObservation,
        policy: &ObservationPolicy,
    ) {
        if let Some(sink) = &self.sink {
            sink.record(&ProbeEvent::exit(key.clone(), timestamp_ns, observation));
        }
        let Some(handle) = self.registry.get(key) else {
            trace!("exit without entry: {key}");
            return;
        };
        handle.update(|state| {
            let elapsed = self.pairing.on_exit(state, timestamp_ns);
            aggregator::fold_exit(&mut state.metrics, elapsed, policy, &observation);
        });
    }

    /// Apply an entry and its exit as one update of the key's record
    ///
    /// Used when the attachment layer already knows both ends of a call, such
    /// as a replayed trace; no other update of the key can land in between.
    pub fn record_call(
        &self,
        key: &InstrumentationKey,
        entry_ns: u64,
        exit_ns: u64,
        observation: ExitObservation,
    ) {
        if let Some(sink) = &self.sink {
            sink.record(&ProbeEvent::entry(key.clone(), entry_ns));
            sink.record(&ProbeEvent::exit(key.clone(), exit_ns, observation));
        }
        let policy = self.policies.lookup(&key.function);
        self.registry.get_or_create(key).update(|state| {
            self.pairing.on_entry(state, entry_ns);
            let elapsed = self.pairing.on_exit(state, exit_ns);
            aggregator::fold_exit(&mut state.metrics, elapsed, &policy, &observation);
        });
    }

    /// Dispatch one event from the attachment layer
    pub fn apply(&self, event: &ProbeEvent) {
        match event {
            ProbeEvent::Entry(entry) => self.on_entry(&entry.key, entry.timestamp_ns),
            ProbeEvent::Exit(exit) => self.on_exit(&exit.key, exit.timestamp_ns, exit.observation),
        }
    }

    /// Copy of every record, sorted by key
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.registry)
    }

    /// Number of keys seen so far
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pairing::CallStack;
    use crate::engine::record::NO_SAMPLES;
    use std::sync::{Arc, Mutex};

    fn decode_session() -> Session {
        let policies = PolicyTable::builtin().with(
            "decode",
            ObservationPolicy { byte_size: true, ..ObservationPolicy::SIGNED_RETURN },
        );
        Session::new(SessionConfig { policies, ..SessionConfig::default() })
    }

    #[test]
    fn test_entry_exit_yields_one_sample() {
        let session = decode_session();
        let key = InstrumentationKey::new(100, 1, "decode");

        session.on_entry(&key, 1000);
        session.on_exit(&key, 1500, ExitObservation::new(Some(200), Some(0)));

        let snapshot = session.snapshot();
        let record = snapshot.get(&key).unwrap();
        assert_eq!(record.packet_count, 1);
        assert_eq!(record.total_delay_ns, 500);
        assert_eq!(record.min_delay_ns, 500);
        assert_eq!(record.max_delay_ns, 500);
        assert_eq!(record.total_bytes, 200);
        assert_eq!(record.dropped_packets, 0);
        assert_eq!(record.last_timestamp_ns, 1000);
    }

    #[test]
    fn test_unmatched_exit_changes_nothing() {
        let session = decode_session();
        let known = InstrumentationKey::new(100, 1, "decode");
        session.on_entry(&known, 10);
        let before = session.snapshot();

        session.on_exit(&InstrumentationKey::new(100, 2, "decode"), 50, ExitObservation::default());

        assert_eq!(session.key_count(), 1);
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_non_positive_elapsed_still_counts_work() {
        let session = decode_session();
        let key = InstrumentationKey::new(100, 1, "decode");

        session.on_entry(&key, 2000);
        session.on_exit(&key, 1500, ExitObservation::new(Some(64), Some(-1)));

        let record = session.snapshot().get(&key).copied().unwrap();
        assert_eq!(record.packet_count, 1);
        assert_eq!(record.total_bytes, 64);
        assert_eq!(record.dropped_packets, 1);
        assert_eq!(record.total_delay_ns, 0);
        assert_eq!(record.min_delay_ns, NO_SAMPLES);
    }

    #[test]
    fn test_explicit_policy_overrides_table() {
        let session = decode_session();
        let key = InstrumentationKey::new(100, 1, "decode");

        session.on_entry(&key, 0);
        session.on_exit_with(
            &key,
            10,
            ExitObservation::new(Some(99), Some(-1)),
            &ObservationPolicy::LATENCY_ONLY,
        );

        let record = session.snapshot().get(&key).copied().unwrap();
        assert_eq!(record.packet_count, 0);
        assert_eq!(record.dropped_packets, 0);
        assert_eq!(record.total_delay_ns, 10);
    }

    #[test]
    fn test_call_stack_strategy_is_pluggable() {
        let session = Session::with_strategy(PolicyTable::builtin(), Box::new(CallStack::default()));
        let key = InstrumentationKey::new(1, 1, "av_packet_ref");

        session.on_entry(&key, 100);
        session.on_entry(&key, 150);
        session.on_exit(&key, 160, ExitObservation::default());
        session.on_exit(&key, 400, ExitObservation::default());

        let record = session.snapshot().get(&key).copied().unwrap();
        assert_eq!(record.min_delay_ns, 10);
        assert_eq!(record.max_delay_ns, 300);
        assert_eq!(record.total_delay_ns, 310);
    }

    #[derive(Default)]
    struct CollectingSink(Arc<Mutex<Vec<ProbeEvent>>>);

    impl EventSink for CollectingSink {
        fn record(&self, event: &ProbeEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_event_sink_sees_raw_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut session = decode_session();
        session.set_event_sink(Box::new(CollectingSink(Arc::clone(&events))));

        let key = InstrumentationKey::new(100, 1, "decode");
        session.on_exit(&key, 5, ExitObservation::default());
        session.record_call(&key, 10, 20, ExitObservation::default().with_outcome(0));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(!events[0].is_entry());
        assert!(events[1].is_entry());
        assert_eq!(events[2].timestamp_ns(), 20);
    }

    #[test]
    fn test_apply_dispatches_events() {
        let session = decode_session();
        let key = InstrumentationKey::new(100, 1, "decode");

        session.apply(&ProbeEvent::entry(key.clone(), 1000));
        session.apply(&ProbeEvent::exit(key.clone(), 1250, ExitObservation::default()));

        assert_eq!(session.snapshot().get(&key).map(|r| r.total_delay_ns), Some(250));
    }
}
