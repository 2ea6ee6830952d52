//! # Event Processing
//!
//! Consumes records from the eBPF ring buffer and drives the session.
//!
//! ## Event Routing
//!
//! - `EVENT_ENTRY` → [`Session::on_entry`]
//! - `EVENT_EXIT` → [`Session::on_exit`] with the byte size and return code
//!   the kernel side captured
//!
//! Records with an unknown function id or event type, and records shorter
//! than a [`CallEvent`], are counted and skipped.

use jbmon_common::{probe_target, CallEvent, EVENT_ENTRY, EVENT_EXIT};
use log::warn;

use crate::domain::{FunctionName, InstrumentationKey};
use crate::engine::{ExitObservation, ProbeEvent, Session};

/// Per-type counters for the end-of-run summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorStats {
    pub entries: u64,
    pub exits: u64,
    pub malformed: u64,
    pub unknown: u64,
}

impl ProcessorStats {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.entries + self.exits
    }
}

/// Encapsulates event decoding and the session it feeds
pub struct EventProcessor<'a> {
    session: &'a Session,
    pub stats: ProcessorStats,
}

impl<'a> EventProcessor<'a> {
    #[must_use]
    pub fn new(session: &'a Session) -> Self {
        Self { session, stats: ProcessorStats::default() }
    }

    /// Decode one raw ring buffer record and apply it
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() < std::mem::size_of::<CallEvent>() {
            if self.stats.malformed == 0 {
                warn!("Received incomplete event ({} bytes)", bytes.len());
            }
            self.stats.malformed += 1;
            return;
        }

        // SAFETY: the buffer holds at least one CallEvent written by the eBPF
        // program; read_unaligned tolerates the ring buffer's alignment
        #[allow(unsafe_code)]
        let event = unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<CallEvent>()) };

        self.process_event(&event);
    }

    /// Apply a decoded event
    pub fn process_event(&mut self, event: &CallEvent) {
        let Some(probe_event) = to_probe_event(event) else {
            if self.stats.unknown == 0 {
                warn!(
                    "Unknown event: function_id={} event_type={}",
                    event.function_id, event.event_type
                );
            }
            self.stats.unknown += 1;
            return;
        };

        if probe_event.is_entry() {
            self.stats.entries += 1;
        } else {
            self.stats.exits += 1;
        }
        self.session.apply(&probe_event);
    }
}

/// Translate a kernel event into the engine's event type
#[must_use]
pub fn to_probe_event(event: &CallEvent) -> Option<ProbeEvent> {
    let target = probe_target(event.function_id)?;
    let key = InstrumentationKey::new(event.pid, event.tid, FunctionName::new(target.symbol));

    match event.event_type {
        EVENT_ENTRY => Some(ProbeEvent::entry(key, event.timestamp_ns)),
        EVENT_EXIT => Some(ProbeEvent::exit(
            key,
            event.timestamp_ns,
            ExitObservation::new(event.byte_size(), event.return_code()),
        )),
        _ => None,
    }
}
