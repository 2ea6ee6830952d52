use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::ExportError;
use crate::engine::Snapshot;

/// Exported document
#[derive(Debug, Serialize)]
struct SnapshotDocument<'a> {
    generated_by: &'static str,
    /// Pairing strategy the figures were produced with
    pairing: &'a str,
    keys: Vec<KeyStats<'a>>,
}

/// Statistics of one key; sentinel values become `null`
#[derive(Debug, Serialize)]
struct KeyStats<'a> {
    pid: u32,
    tid: u32,
    function: &'a str,
    packet_count: u64,
    dropped_packets: u64,
    total_bytes: u64,
    total_delay_ns: u64,
    min_delay_ns: Option<u64>,
    max_delay_ns: Option<u64>,
    avg_delay_ns: Option<f64>,
    buffer_size: u64,
}

/// Writes a [`Snapshot`] as pretty-printed JSON
pub struct SnapshotExporter<'a> {
    snapshot: &'a Snapshot,
    pairing: &'a str,
}

impl<'a> SnapshotExporter<'a> {
    #[must_use]
    pub fn new(snapshot: &'a Snapshot, pairing: &'a str) -> Self {
        Self { snapshot, pairing }
    }

    /// Serialize the snapshot into `writer`
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        let keys = self
            .snapshot
            .iter()
            .map(|(key, record)| KeyStats {
                pid: key.pid.0,
                tid: key.tid.0,
                function: key.function.as_str(),
                packet_count: record.packet_count,
                dropped_packets: record.dropped_packets,
                total_bytes: record.total_bytes,
                total_delay_ns: record.total_delay_ns,
                min_delay_ns: record.min_delay_ns(),
                max_delay_ns: record.max_delay_ns(),
                avg_delay_ns: record.average_delay_ns(),
                buffer_size: record.buffer_size,
            })
            .collect();

        let document = SnapshotDocument {
            generated_by: concat!("jbmon ", env!("CARGO_PKG_VERSION")),
            pairing: self.pairing,
            keys,
        };

        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Create (or truncate) `path` and export into it
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn export_to_file(&self, path: &Path) -> Result<(), ExportError> {
        let file = File::create(path)
            .map_err(|e| ExportError::WriteFailed(format!("{}: {e}", path.display())))?;
        self.export(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentationKey;
    use crate::engine::MetricsRecord;

    #[test]
    fn test_sentinels_export_as_null() {
        let snapshot = Snapshot::from_entries(vec![(
            InstrumentationKey::new(9, 9, "av_packet_alloc"),
            MetricsRecord::new(),
        )]);

        let mut buffer = Vec::new();
        SnapshotExporter::new(&snapshot, "last-write-wins").export(&mut buffer).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        let key = &parsed["keys"][0];
        assert_eq!(key["function"], "av_packet_alloc");
        assert!(key["min_delay_ns"].is_null());
        assert!(key["max_delay_ns"].is_null());
        assert!(key["avg_delay_ns"].is_null());
        assert_eq!(parsed["pairing"], "last-write-wins");
    }
}
