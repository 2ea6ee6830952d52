use anyhow::{Context, Result};
use aya::maps::HashMap;
use aya::Ebpf;

/// Number of events the kernel side could not push into the ring buffer
///
/// # Errors
/// Returns an error if the diagnostics map cannot be accessed
pub fn ring_buffer_drops(bpf: &Ebpf) -> Result<u64> {
    let failed_map: HashMap<_, u32, u64> = HashMap::try_from(
        bpf.map("EVENTS_OUTPUT_FAILED").context("EVENTS_OUTPUT_FAILED map not found")?,
    )?;
    Ok(failed_map.get(&0u32, 0).unwrap_or(0))
}

/// Print ring buffer diagnostics
///
/// A non-zero count means the userspace loop fell behind and some calls were
/// never seen: their keys under-count and may pair an entry with a later exit.
///
/// # Errors
/// Returns an error if the eBPF diagnostic maps cannot be accessed
pub fn print_ring_buffer_diagnostics(bpf: &Ebpf) -> Result<()> {
    let dropped = ring_buffer_drops(bpf)?;
    if dropped > 0 {
        eprintln!("warning: {dropped} events lost to a full ring buffer");
    }
    Ok(())
}
