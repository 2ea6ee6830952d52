use log::warn;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::domain::ExportError;
use crate::engine::{EventSink, ProbeEvent};
use crate::trace_data::RecordedEvent;

/// Event sink writing every raw event as one JSON line
///
/// The output is the trace format read back by `--replay`. Write failures
/// are counted and logged, never propagated into the engine.
pub struct EventRecorder<W: Write + Send> {
    writer: Mutex<W>,
    written: AtomicU64,
    failed: AtomicU64,
}

impl EventRecorder<BufWriter<File>> {
    /// Record into a new file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create(path: &Path) -> Result<Self, ExportError> {
        let file = File::create(path)
            .map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> EventRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer), written: AtomicU64::new(0), failed: AtomicU64::new(0) }
    }

    /// Events written so far
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Events lost to write errors
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Flush buffered lines
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails to flush
    pub fn flush(&self) -> Result<(), ExportError> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner).flush()?;
        Ok(())
    }

    /// Give back the writer (tests inspect in-memory output through this)
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_event(&self, event: &ProbeEvent) -> Result<(), ExportError> {
        let line = serde_json::to_vec(&RecordedEvent::from(event))?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> EventSink for EventRecorder<W> {
    fn record(&self, event: &ProbeEvent) {
        match self.write_event(event) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                // Log the first failure only; a full disk would flood the log
                if self.failed.fetch_add(1, Ordering::Relaxed) == 0 {
                    warn!("Failed to record event: {e}");
                }
            }
        }
    }
}
