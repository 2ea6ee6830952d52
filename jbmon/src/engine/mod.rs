//! # Aggregation Engine
//!
//! Pairs entry/exit events per (process, thread, function) key and folds the
//! resulting latency samples and side counters into running statistics.
//!
//! ## Data Flow
//!
//! ```text
//! ProbeEvent::Entry ──► KeyRegistry.get_or_create ──► PairingStrategy.on_entry
//!
//! ProbeEvent::Exit  ──► KeyRegistry.get ──► PairingStrategy.on_exit ──► aggregator::fold_exit
//!                                                                          ▲
//!                                                      PolicyTable.lookup ─┘
//!
//! Session.snapshot ──► Snapshot (sorted copies)
//! ```
//!
//! ## Concurrency
//!
//! The registry is sharded and each record has its own lock: updates to one
//! key are serialized, updates to different keys do not contend.

pub mod aggregator;
pub mod event;
pub mod pairing;
pub mod policy;
pub mod record;
pub mod registry;
pub mod session;
pub mod snapshot;

pub use event::{EntryEvent, ExitEvent, ExitObservation, ProbeEvent};
pub use pairing::{CallStack, LastWriteWins, PairingMode, PairingStrategy};
pub use policy::{ObservationPolicy, OutcomeRule, PolicyShape, PolicyTable};
pub use record::{MetricsRecord, RecordHandle, RecordState, NO_SAMPLES};
pub use registry::KeyRegistry;
pub use session::{EventSink, Session, SessionConfig};
pub use snapshot::Snapshot;
