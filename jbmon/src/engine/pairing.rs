//! Pairing: turning an entry and a later exit of the same key into one
//! elapsed-time sample.
//!
//! The strategy is pluggable. [`LastWriteWins`] keeps only the most recent
//! entry timestamp; [`CallStack`] keeps one timestamp per call in flight so
//! overlapping calls on the same key pair up innermost-first.

use std::fmt;

use super::record::RecordState;

/// Upper bound on in-flight calls remembered per key by [`CallStack`]
pub const MAX_OPEN_CALLS: usize = 64;

/// Pairing policy, applied under the record lock of the key
pub trait PairingStrategy: Send + Sync + fmt::Debug {
    /// Short name for logs and reports
    fn name(&self) -> &'static str;

    /// Record an entry observed at `timestamp_ns`
    fn on_entry(&self, state: &mut RecordState, timestamp_ns: u64);

    /// Match an exit observed at `timestamp_ns` to an entry
    ///
    /// Returns the elapsed time, or `None` when no positive sample can be
    /// derived (no matching entry, or a clock that went backwards).
    fn on_exit(&self, state: &mut RecordState, timestamp_ns: u64) -> Option<u64>;
}

/// Elapsed time from `start` to `end`, if strictly positive
fn positive_elapsed(start: u64, end: u64) -> Option<u64> {
    end.checked_sub(start).filter(|&elapsed| elapsed > 0)
}

/// Every entry overwrites the baseline of the next exit
///
/// Overlapping calls on the same (pid, tid, function) lose the earlier
/// entry: the exit of the outer call is measured from the inner call's entry.
/// The baseline is not cleared by an exit, so a duplicated exit is measured
/// from the same entry again.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastWriteWins;

impl PairingStrategy for LastWriteWins {
    fn name(&self) -> &'static str {
        "last-write-wins"
    }

    fn on_entry(&self, state: &mut RecordState, timestamp_ns: u64) {
        state.metrics.last_timestamp_ns = timestamp_ns;
    }

    fn on_exit(&self, state: &mut RecordState, timestamp_ns: u64) -> Option<u64> {
        positive_elapsed(state.metrics.last_timestamp_ns, timestamp_ns)
    }
}

/// Entries push, exits pop: nested calls on one key are measured separately
///
/// At most `max_depth` entries are remembered; beyond that the oldest is
/// forgotten and its exit will find the stack empty.
#[derive(Debug, Clone, Copy)]
pub struct CallStack {
    max_depth: usize,
}

impl CallStack {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth: max_depth.max(1) }
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new(MAX_OPEN_CALLS)
    }
}

impl PairingStrategy for CallStack {
    fn name(&self) -> &'static str {
        "call-stack"
    }

    fn on_entry(&self, state: &mut RecordState, timestamp_ns: u64) {
        if state.open_calls.len() == self.max_depth {
            state.open_calls.pop_front();
        }
        state.open_calls.push_back(timestamp_ns);
        state.metrics.last_timestamp_ns = timestamp_ns;
    }

    fn on_exit(&self, state: &mut RecordState, timestamp_ns: u64) -> Option<u64> {
        let entered = state.open_calls.pop_back()?;
        positive_elapsed(entered, timestamp_ns)
    }
}

/// Selectable pairing strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingMode {
    #[default]
    LastWriteWins,
    CallStack,
}

impl PairingMode {
    #[must_use]
    pub fn strategy(self) -> Box<dyn PairingStrategy> {
        match self {
            Self::LastWriteWins => Box::new(LastWriteWins),
            Self::CallStack => Box::new(CallStack::default()),
        }
    }
}
