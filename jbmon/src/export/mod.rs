//! Export functionality
//!
//! - [`SnapshotExporter`]: final statistics as a JSON document
//! - [`EventRecorder`]: raw event stream as JSON lines (replayable)

pub mod event_log;
pub mod snapshot_json;

pub use event_log::EventRecorder;
pub use snapshot_json::SnapshotExporter;
