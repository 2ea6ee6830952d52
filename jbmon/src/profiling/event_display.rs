// Delay conversions intentionally lose precision for display purposes
#![allow(clippy::cast_precision_loss)]

use std::fmt::Write as _;

use super::event_processor::ProcessorStats;
use crate::domain::InstrumentationKey;
use crate::engine::{MetricsRecord, Snapshot};

fn format_us(ns: f64) -> String {
    format!("{:.1}us", ns / 1_000.0)
}

/// One report line: packets, drops, bytes and min/avg/max delay
///
/// Min is omitted until the first latency sample, max while it is zero.
#[must_use]
pub fn format_report_line(key: &InstrumentationKey, record: &MetricsRecord) -> String {
    let mut line = format!(
        "{key}: packets={} dropped={} bytes={}",
        record.packet_count, record.dropped_packets, record.total_bytes
    );
    if let Some(min) = record.min_delay_ns() {
        let _ = write!(line, " min={}", format_us(min as f64));
    }
    if let Some(avg) = record.average_delay_ns() {
        let _ = write!(line, " avg={}", format_us(avg));
    }
    if let Some(max) = record.max_delay_ns() {
        let _ = write!(line, " max={}", format_us(max as f64));
    }
    line
}

/// Print the per-key report for a snapshot
pub fn display_report(snapshot: &Snapshot) {
    if snapshot.is_empty() {
        println!("no calls observed yet");
        return;
    }
    println!("── {} keys ──", snapshot.len());
    for (key, record) in snapshot.iter() {
        println!("{}", format_report_line(key, record));
    }
}

/// Display event counters
pub fn display_statistics(stats: &ProcessorStats) {
    eprintln!(
        "stats: entries={} exits={} malformed={} unknown={}",
        stats.entries, stats.exits, stats.malformed, stats.unknown
    );
}
