use jbmon::domain::InstrumentationKey;
use jbmon::engine::{
    ExitObservation, ObservationPolicy, OutcomeRule, PairingMode, PolicyTable, Session,
    SessionConfig, NO_SAMPLES,
};
use std::sync::Arc;
use std::thread;

/// "decode" counts packets and bytes; a negative return is a drop
fn decode_policies() -> PolicyTable {
    PolicyTable::builtin().with(
        "decode",
        ObservationPolicy { counts_work: true, byte_size: true, outcome: OutcomeRule::SignedReturn },
    )
}

fn session_with(pairing: PairingMode) -> Session {
    Session::new(SessionConfig { policies: decode_policies(), pairing })
}

#[test]
fn test_two_calls_fold_into_one_record() {
    let session = session_with(PairingMode::LastWriteWins);
    let key = InstrumentationKey::new(100, 1, "decode");

    session.on_entry(&key, 1000);
    session.on_exit(&key, 1500, ExitObservation::new(Some(200), Some(0)));

    let first = session.snapshot().get(&key).copied().expect("key exists");
    assert_eq!(
        (first.packet_count, first.total_delay_ns, first.min_delay_ns, first.max_delay_ns),
        (1, 500, 500, 500)
    );
    assert_eq!((first.total_bytes, first.dropped_packets), (200, 0));

    session.on_entry(&key, 2000);
    session.on_exit(&key, 2100, ExitObservation::new(Some(0), Some(-5)));

    let second = session.snapshot().get(&key).copied().expect("key exists");
    assert_eq!(second.packet_count, 2);
    assert_eq!(second.total_delay_ns, 600);
    assert_eq!(second.min_delay_ns, 100);
    assert_eq!(second.max_delay_ns, 500);
    assert_eq!(second.total_bytes, 200);
    assert_eq!(second.dropped_packets, 1);
    assert_eq!(second.buffer_size, 0);
}

#[test]
fn test_overlapping_entries_keep_the_latest() {
    let session = session_with(PairingMode::LastWriteWins);
    let key = InstrumentationKey::new(100, 1, "decode");

    session.on_entry(&key, 100);
    session.on_entry(&key, 250);
    session.on_exit(&key, 400, ExitObservation::new(Some(10), Some(0)));

    let record = session.snapshot().get(&key).copied().expect("key exists");
    assert_eq!(record.total_delay_ns, 150);
    assert_eq!(record.packet_count, 1);
}

#[test]
fn test_call_stack_pairs_nested_calls() {
    let session = session_with(PairingMode::CallStack);
    let key = InstrumentationKey::new(100, 1, "decode");

    session.on_entry(&key, 100);
    session.on_entry(&key, 250);
    session.on_exit(&key, 400, ExitObservation::new(Some(10), Some(0)));
    session.on_exit(&key, 1000, ExitObservation::new(Some(10), Some(0)));

    let record = session.snapshot().get(&key).copied().expect("key exists");
    assert_eq!(record.min_delay_ns, 150);
    assert_eq!(record.max_delay_ns, 900);
    assert_eq!(record.packet_count, 2);
}

#[test]
fn test_outcome_classification() {
    let session = session_with(PairingMode::LastWriteWins);
    let failing = InstrumentationKey::new(7, 7, "decode");
    let passing = InstrumentationKey::new(7, 8, "decode");

    session.on_entry(&failing, 10);
    session.on_exit(&failing, 20, ExitObservation::default().with_outcome(-1));
    session.on_entry(&passing, 10);
    session.on_exit(&passing, 20, ExitObservation::default().with_outcome(0));

    let snapshot = session.snapshot();
    let failing = snapshot.get(&failing).expect("failing key");
    let passing = snapshot.get(&passing).expect("passing key");
    assert_eq!((failing.packet_count, failing.dropped_packets), (1, 1));
    assert_eq!((passing.packet_count, passing.dropped_packets), (1, 0));
}

#[test]
fn test_latency_only_function_counts_no_work() {
    let session = session_with(PairingMode::LastWriteWins);
    let key = InstrumentationKey::new(1, 1, "av_packet_alloc");

    session.on_entry(&key, 0);
    session.on_exit(&key, 80, ExitObservation::new(Some(4096), Some(-12)));

    let record = session.snapshot().get(&key).copied().expect("key exists");
    assert_eq!(record.packet_count, 0);
    assert_eq!(record.total_bytes, 0);
    assert_eq!(record.dropped_packets, 0);
    assert_eq!(record.total_delay_ns, 80);
    assert_eq!(record.average_delay_ns(), None);
}

#[test]
fn test_snapshot_is_isolated_and_repeatable() {
    let session = session_with(PairingMode::LastWriteWins);
    let key = InstrumentationKey::new(100, 1, "decode");
    session.on_entry(&key, 0);

    let first = session.snapshot();
    assert_eq!(first, session.snapshot());
    assert_eq!(first.get(&key).map(|r| r.min_delay_ns), Some(NO_SAMPLES));

    session.on_exit(&key, 50, ExitObservation::new(Some(1), Some(0)));

    // Earlier copies do not move
    assert_eq!(first.get(&key).map(|r| r.packet_count), Some(0));
    assert_eq!(session.snapshot().get(&key).map(|r| r.packet_count), Some(1));
}

#[test]
fn test_snapshot_sorted_by_key() {
    let session = session_with(PairingMode::LastWriteWins);
    for (pid, tid, function) in [(200, 1, "b"), (100, 2, "a"), (100, 1, "z"), (100, 1, "a")] {
        session.on_entry(&InstrumentationKey::new(pid, tid, function), 1);
    }

    let keys: Vec<String> = session.snapshot().iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(
        keys,
        ["PID:100 TID:1 a", "PID:100 TID:1 z", "PID:100 TID:2 a", "PID:200 TID:1 b"]
    );
}

#[test]
fn test_concurrent_calls_on_one_key_are_exact() {
    const THREADS: u64 = 8;
    const CALLS: u64 = 2_000;

    let session = Arc::new(session_with(PairingMode::LastWriteWins));
    let key = InstrumentationKey::new(100, 1, "decode");

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let session = Arc::clone(&session);
            let key = key.clone();
            thread::spawn(move || {
                for i in 0..CALLS {
                    let start = (t * CALLS + i) * 1_000;
                    // elapsed cycles through 1..=10
                    session.record_call(
                        &key,
                        start,
                        start + 1 + i % 10,
                        ExitObservation::new(Some(3), Some(0)),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let expected_delay: u64 = (0..CALLS).map(|i| 1 + i % 10).sum::<u64>() * THREADS;
    let record = session.snapshot().get(&key).copied().expect("key exists");
    assert_eq!(record.packet_count, THREADS * CALLS);
    assert_eq!(record.total_delay_ns, expected_delay);
    assert_eq!(record.total_bytes, 3 * THREADS * CALLS);
    assert_eq!(record.min_delay_ns, 1);
    assert_eq!(record.max_delay_ns, 10);
}

#[test]
fn test_concurrent_entry_exit_on_one_key_loses_no_work() {
    const THREADS: u64 = 8;
    const CALLS: u64 = 2_000;

    let session = Arc::new(session_with(PairingMode::LastWriteWins));
    let key = InstrumentationKey::new(100, 1, "decode");

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let session = Arc::clone(&session);
            let key = key.clone();
            thread::spawn(move || {
                for i in 0..CALLS {
                    let start = (t * CALLS + i) * 1_000;
                    session.on_entry(&key, start);
                    session.on_exit(&key, start + 25, ExitObservation::new(Some(2), Some(0)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    // Which entry an exit pairs with is up to the interleaving; the work is not
    let record = session.snapshot().get(&key).copied().expect("key exists");
    assert_eq!(record.packet_count, THREADS * CALLS);
    assert_eq!(record.total_bytes, 2 * THREADS * CALLS);
    assert_eq!(record.dropped_packets, 0);
}

#[test]
fn test_concurrent_threads_on_their_own_keys() {
    const THREADS: u32 = 8;
    const CALLS: u64 = 1_000;

    let session = Arc::new(session_with(PairingMode::LastWriteWins));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let key = InstrumentationKey::new(100, tid, "decode");
                for i in 0..CALLS {
                    session.on_entry(&key, i * 100);
                    session.on_exit(&key, i * 100 + 40, ExitObservation::new(Some(1), Some(0)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let snapshot = session.snapshot();
    assert_eq!(snapshot.len(), THREADS as usize);
    for (_, record) in snapshot.iter() {
        assert_eq!(record.packet_count, CALLS);
        assert_eq!(record.total_delay_ns, 40 * CALLS);
    }
}
