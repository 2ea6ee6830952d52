//! Recorded event traces (JSON lines)
//!
//! `--record` writes one [`RecordedEvent`] per line as events arrive;
//! `--replay` reads such a file back and feeds it through a fresh session.
//!
//! ```text
//! {"kind":"entry","pid":100,"tid":1,"function":"decode","timestamp_ns":1000}
//! {"kind":"exit","pid":100,"tid":1,"function":"decode","timestamp_ns":1500,"byte_size":200,"outcome_code":0}
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::{InstrumentationKey, ReplayError};
use crate::engine::{ExitObservation, ProbeEvent, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Entry,
    Exit,
}

/// One line of a recorded trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub kind: EventKind,
    pub pid: u32,
    pub tid: u32,
    pub function: String,
    pub timestamp_ns: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_code: Option<i64>,
}

impl From<&ProbeEvent> for RecordedEvent {
    fn from(event: &ProbeEvent) -> Self {
        let key = event.key();
        let (kind, observation) = match event {
            ProbeEvent::Entry(_) => (EventKind::Entry, ExitObservation::default()),
            ProbeEvent::Exit(exit) => (EventKind::Exit, exit.observation),
        };
        Self {
            kind,
            pid: key.pid.0,
            tid: key.tid.0,
            function: key.function.as_str().to_string(),
            timestamp_ns: event.timestamp_ns(),
            byte_size: observation.byte_size,
            outcome_code: observation.outcome_code,
        }
    }
}

impl From<RecordedEvent> for ProbeEvent {
    fn from(event: RecordedEvent) -> Self {
        let key = InstrumentationKey::new(event.pid, event.tid, event.function);
        match event.kind {
            EventKind::Entry => ProbeEvent::entry(key, event.timestamp_ns),
            EventKind::Exit => ProbeEvent::exit(
                key,
                event.timestamp_ns,
                ExitObservation::new(event.byte_size, event.outcome_code),
            ),
        }
    }
}

/// Parse a JSON-lines trace; blank lines are skipped
///
/// # Errors
/// Returns the first malformed line (1-based) or read failure
pub fn read_trace<R: BufRead>(reader: R, path: &Path) -> Result<Vec<ProbeEvent>, ReplayError> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line
            .map_err(|source| ReplayError::ReadFailed { path: path.to_path_buf(), source })?;
        if line.trim().is_empty() {
            continue;
        }
        let recorded: RecordedEvent = serde_json::from_str(&line)
            .map_err(|source| ReplayError::MalformedEvent { line: idx + 1, source })?;
        events.push(recorded.into());
    }
    Ok(events)
}

/// Read a trace file
///
/// # Errors
/// Returns an error if the file cannot be opened or contains a malformed line
pub fn load_trace(path: &Path) -> Result<Vec<ProbeEvent>, ReplayError> {
    let file = File::open(path)
        .map_err(|source| ReplayError::ReadFailed { path: path.to_path_buf(), source })?;
    read_trace(BufReader::new(file), path)
}

/// Counts of a replay run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub entries: usize,
    pub exits: usize,
}

/// Feed `events` through `session` in order
pub fn replay(session: &Session, events: &[ProbeEvent]) -> ReplayStats {
    let mut stats = ReplayStats::default();
    for event in events {
        if event.is_entry() {
            stats.entries += 1;
        } else {
            stats.exits += 1;
        }
        session.apply(event);
    }
    stats
}
