//! # jbmon - eBPF Jitter-Buffer and Codec Call Monitor
//!
//! jbmon attaches uprobes/uretprobes to jitter-buffer and codec functions of a
//! media pipeline, pairs each call's entry with its exit, and aggregates the
//! resulting latencies and side data (packet counts, drops, bytes) per
//! (process, thread, function).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Media Application                           │
//! │        jitterbuffer_*, rtp_parse_packet, libavcodec, ...        │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ calls
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     eBPF Programs (Kernel)                      │
//! │  • Uprobes:    {function}_entry  (timestamp, byte size stash)   │
//! │  • Uretprobes: {function}_return (timestamp, return code)       │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ ring buffer events
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        jbmon (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Profiling   │──▶│    Event     │──▶│    Engine    │         │
//! │  │   (eBPF)     │   │  Processor   │   │  (Session)   │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               │                 │
//! │                     ┌──────────────┐          ▼                 │
//! │   --replay ────────▶│  trace_data  │   ┌──────────────┐         │
//! │                     └──────────────┘   │    Export    │         │
//! │                                        │ (JSON, JSONL)│         │
//! │                                        └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`engine`]: Entry/exit pairing and per-key statistics
//!   - `session`: the owner of one registry, its policies and pairing strategy
//!   - `policy`: which parts of an exit count for which function
//!   - `pairing`: last-write-wins (default) and call-stack matching
//!
//! - [`profiling`]: eBPF program management and ring buffer decoding
//!
//! - [`export`]: Final statistics as JSON, raw events as JSON lines
//!
//! - [`trace_data`]: The recorded event format and replay
//!
//! - [`cli`]: Command-line argument parsing
//!
//! - [`domain`]: Core domain types (Pid, Tid, `FunctionName`, keys, errors)
//!
//! ## Operational Modes
//!
//! 1. **Live** (default): attach probes, print a report every `--interval`
//! 2. **Replay** (`--replay calls.jsonl`): aggregate a recording, no eBPF
//!
//! ## Typical Usage
//!
//! ```bash
//! # Monitor a running player
//! sudo ./jbmon --pid <PID>
//!
//! # Record raw events and export final statistics
//! sudo ./jbmon my-player --record calls.jsonl --export stats.json
//!
//! # Re-aggregate the recording with nested-call pairing
//! ./jbmon --replay calls.jsonl --pairing call-stack
//! ```
//!
//! ## Key Concepts
//!
//! - **Key**: (PID, TID, function name); every key has its own statistics
//! - **Pairing**: matching an exit to the entry it closes
//! - **Observation policy**: whether a function counts packets, bytes and
//!   failures, decided per function name

pub mod cli;
pub mod domain;
pub mod engine;
pub mod export;
pub mod preflight;
pub mod process_lookup;
pub mod profiling;
pub mod trace_data;
