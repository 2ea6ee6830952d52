//! # eBPF Program Loading and Attachment
//!
//! Loads compiled eBPF bytecode and attaches the call probes.
//!
//! ## Functions
//!
//! - [`load_ebpf_program()`] - Load eBPF bytecode from embedded binary
//! - [`set_target_pid()`] - Restrict event emission to one process
//! - [`probe_objects()`] - Target binary plus the media libraries present on disk
//! - [`attach_call_probes()`] - Attach every entry/return program to every object
//!
//! ## Attachment Points
//!
//! - **Uprobe**: `{stem}_entry` on each symbol in [`PROBE_TARGETS`]
//! - **Uretprobe**: `{stem}_return` on the same symbol
//!
//! A symbol missing from an object is normal (each library exports only a
//! subset of the probed functions) and only logged at debug level.

use anyhow::{Context, Result};
use aya::{include_bytes_aligned, maps::HashMap, programs::UProbe, Ebpf};
use aya_log::EbpfLogger;
use jbmon_common::{ProbeTarget, CONFIG_TARGET_PID, PROBE_TARGETS};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::domain::{Pid, ProfilerError};

/// Media libraries probed in addition to the target binary
pub const LIBRARY_CANDIDATES: [&str; 6] = [
    "/usr/lib/x86_64-linux-gnu/libavcodec.so.58",
    "/usr/lib/x86_64-linux-gnu/libavformat.so.58",
    "/usr/lib/x86_64-linux-gnu/libavutil.so.56",
    "/usr/lib/aarch64-linux-gnu/libavcodec.so.58",
    "/usr/lib/aarch64-linux-gnu/libavformat.so.58",
    "/usr/lib/aarch64-linux-gnu/libavutil.so.56",
];

/// One successfully attached program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedProbe {
    pub program: String,
    pub symbol: &'static str,
    pub object: PathBuf,
}

/// Load the eBPF program binary
///
/// Always uses the release build because debug builds pull in formatting code
/// that the BPF verifier rejects. The release build uses LTO to eliminate dead
/// code.
///
/// # Errors
/// Returns an error if the eBPF program binary cannot be loaded
pub fn load_ebpf_program() -> Result<Ebpf> {
    let bpf =
        Ebpf::load(include_bytes_aligned!("../../../target/bpfel-unknown-none/release/jbmon"))?;
    Ok(bpf)
}

/// Initialize eBPF logger
pub fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        warn!("Failed to initialize eBPF logger: {e}");
    }
}

/// Write the PID filter into the `CONFIG` map (`None` = every process)
///
/// # Errors
/// Returns an error if the `CONFIG` map is missing or cannot be written
pub fn set_target_pid(bpf: &mut Ebpf, pid: Option<Pid>) -> Result<()> {
    let mut config_map: HashMap<_, u32, u64> =
        HashMap::try_from(bpf.map_mut("CONFIG").context("CONFIG map not found")?)?;
    let value = pid.map_or(0, |p| u64::from(p.0));
    config_map.insert(CONFIG_TARGET_PID, value, 0)?;
    match pid {
        Some(pid) => info!("✓ Set target {pid}"),
        None => info!("✓ No PID filter: tracing every process mapping the probed objects"),
    }
    Ok(())
}

/// Objects to attach to: the target binary first, then every existing library
/// candidate
#[must_use]
pub fn probe_objects(target: &Path) -> Vec<PathBuf> {
    let mut objects = vec![target.to_path_buf()];
    objects.extend(
        LIBRARY_CANDIDATES.iter().map(PathBuf::from).filter(|path| path.exists() && path != target),
    );
    objects
}

/// Load every entry/return program and attach it wherever its symbol exists
///
/// # Errors
/// Returns [`ProfilerError::ProgramNotFound`] if the object lacks a program
/// and [`ProfilerError::NoProbesAttached`] if nothing could be attached
pub fn attach_call_probes(
    bpf: &mut Ebpf,
    objects: &[PathBuf],
    pid: Option<Pid>,
) -> Result<Vec<AttachedProbe>, ProfilerError> {
    let pid = pid.map(i32::from);
    let mut attached = Vec::new();

    for target in &PROBE_TARGETS {
        for program_name in program_names(target) {
            let program: &mut UProbe = bpf
                .program_mut(&program_name)
                .ok_or_else(|| ProfilerError::ProgramNotFound(program_name.clone()))?
                .try_into()
                .map_err(|e| ProfilerError::EbpfLoadFailed(format!("{program_name}: {e}")))?;
            program
                .load()
                .map_err(|e| ProfilerError::EbpfLoadFailed(format!("{program_name}: {e}")))?;

            for object in objects {
                match program.attach(Some(target.symbol), 0, object, pid) {
                    Ok(_) => {
                        debug!("attached {program_name} to {}", object.display());
                        attached.push(AttachedProbe {
                            program: program_name.clone(),
                            symbol: target.symbol,
                            object: object.clone(),
                        });
                    }
                    Err(e) => {
                        debug!("{program_name} not attached to {}: {e}", object.display());
                    }
                }
            }
        }
    }

    if attached.is_empty() {
        let binary = objects.first().map(|p| p.display().to_string()).unwrap_or_default();
        return Err(ProfilerError::NoProbesAttached { binary });
    }

    info!("✓ Attached {} probes across {} objects", attached.len(), objects.len());
    Ok(attached)
}

fn program_names(target: &ProbeTarget) -> [String; 2] {
    [format!("{}_entry", target.program_stem), format!("{}_return", target.program_stem)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_names_follow_stem() {
        let names = program_names(&PROBE_TARGETS[0]);
        assert_eq!(names, ["jitterbuffer_put_entry".to_string(), "jitterbuffer_put_return".into()]);
    }

    #[test]
    fn test_probe_objects_starts_with_target() {
        let objects = probe_objects(Path::new("/nonexistent/player"));
        assert_eq!(objects[0], PathBuf::from("/nonexistent/player"));
        assert!(objects[1..].iter().all(|p| p.exists()));
    }
}
