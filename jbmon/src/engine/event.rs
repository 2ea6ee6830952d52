//! Event model: the entry and exit notifications the engine consumes.
//!
//! The attachment layer (uprobes, a recorded trace) produces these; by the
//! time an event reaches the engine its scalars are already extracted and its
//! function name already bounded.

use crate::domain::InstrumentationKey;

/// Side data carried by an exit event
///
/// Either field may be missing when the call site cannot provide it; the
/// function's [`ObservationPolicy`](super::ObservationPolicy) decides which
/// fields are meaningful at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitObservation {
    /// Bytes handled by the call (packet size)
    pub byte_size: Option<u64>,

    /// Signed return code of the call
    pub outcome_code: Option<i64>,
}

impl ExitObservation {
    #[must_use]
    pub fn new(byte_size: Option<u64>, outcome_code: Option<i64>) -> Self {
        Self { byte_size, outcome_code }
    }

    #[must_use]
    pub fn with_bytes(mut self, byte_size: u64) -> Self {
        self.byte_size = Some(byte_size);
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome_code: i64) -> Self {
        self.outcome_code = Some(outcome_code);
        self
    }
}

/// An instrumented function started executing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryEvent {
    pub key: InstrumentationKey,
    pub timestamp_ns: u64,
}

/// An instrumented function returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitEvent {
    pub key: InstrumentationKey,
    pub timestamp_ns: u64,
    pub observation: ExitObservation,
}

/// One notification from the attachment layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Entry(EntryEvent),
    Exit(ExitEvent),
}

impl ProbeEvent {
    #[must_use]
    pub fn entry(key: InstrumentationKey, timestamp_ns: u64) -> Self {
        Self::Entry(EntryEvent { key, timestamp_ns })
    }

    #[must_use]
    pub fn exit(key: InstrumentationKey, timestamp_ns: u64, observation: ExitObservation) -> Self {
        Self::Exit(ExitEvent { key, timestamp_ns, observation })
    }

    #[must_use]
    pub fn key(&self) -> &InstrumentationKey {
        match self {
            Self::Entry(e) => &e.key,
            Self::Exit(e) => &e.key,
        }
    }

    #[must_use]
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            Self::Entry(e) => e.timestamp_ns,
            Self::Exit(e) => e.timestamp_ns,
        }
    }

    #[must_use]
    pub fn is_entry(&self) -> bool {
        matches!(self, Self::Entry(_))
    }
}
