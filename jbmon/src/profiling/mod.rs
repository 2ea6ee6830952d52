//! Profiling core modules
//!
//! Everything between the kernel probes and the aggregation engine:
//! - eBPF program loading and probe attachment
//! - Ring buffer record decoding
//! - Report formatting
//! - Kernel-side diagnostics

pub mod diagnostics;
pub mod ebpf_setup;
pub mod event_display;
pub mod event_processor;

// Re-export common types
pub use diagnostics::{print_ring_buffer_diagnostics, ring_buffer_drops};
pub use ebpf_setup::{
    attach_call_probes, init_ebpf_logger, load_ebpf_program, probe_objects, set_target_pid,
    AttachedProbe, LIBRARY_CANDIDATES,
};
pub use event_display::{display_report, display_statistics, format_report_line};
pub use event_processor::{to_probe_event, EventProcessor, ProcessorStats};
