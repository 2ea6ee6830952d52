//! Pre-flight checks for jbmon
//!
//! Validates system requirements before attempting to load eBPF programs.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use jbmon_common::PROBE_TARGETS;
use object::{Object, ObjectSymbol};
use std::collections::HashSet;
use std::path::Path;

use crate::domain::{Pid, ProfilerError};
use crate::process_lookup::process_alive;

/// Minimum kernel version required for eBPF features used by jbmon
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

/// Run all pre-flight checks before eBPF loading
///
/// # Errors
/// Returns an error describing the first unmet requirement
pub fn run_preflight_checks(target_path: &Path, quiet: bool) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_binary_exists(target_path)?;
    check_probed_symbols(target_path, quiet)?;
    Ok(())
}

/// Loading uprobes needs root (or `CAP_BPF` + `CAP_PERFMON`, not inspected)
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        bail!(
            "Permission denied: jbmon requires root privileges to attach uprobes.\n\n\
             Run with: sudo jbmon ...\n\
             (--replay needs no privileges)"
        );
    }
    Ok(())
}

/// `(major, minor)` of a release string such as `6.1.0-arch1-1` or `5.15.0`
fn parse_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts.next()?.chars().take_while(char::is_ascii_digit).collect();
    Some((major, minor.parse().ok()?))
}

/// The ring buffer map type needs Linux 5.8
fn check_kernel_version() -> Result<()> {
    let release = std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .context("Failed to read kernel release from /proc/sys/kernel/osrelease")?;

    // An unparseable release is left to the eBPF loader to reject
    let Some(version) = parse_release(&release) else {
        return Ok(());
    };

    if version < MIN_KERNEL_VERSION {
        bail!(
            "Kernel {} is too old.\n\n\
             jbmon needs Linux {}.{} or newer for the BPF ring buffer.",
            release.trim(),
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1
        );
    }
    Ok(())
}

/// Check if the target binary exists and is readable
fn check_binary_exists(target_path: &Path) -> Result<()> {
    if !target_path.exists() {
        bail!(
            "Binary not found: {}\n\n\
             Make sure the path is correct and the binary exists.",
            target_path.display()
        );
    }
    if !target_path.is_file() {
        bail!(
            "Not a file: {}\n\n\
             --binary must point to an executable file, not a directory.",
            target_path.display()
        );
    }
    Ok(())
}

/// Probed symbols found in the static or dynamic symbol table of `data`
///
/// Returns `None` if `data` is not an object file.
fn probed_symbols_in(data: &[u8]) -> Option<Vec<&'static str>> {
    let obj = object::File::parse(data).ok()?;
    let names: HashSet<&str> = obj
        .symbols()
        .chain(obj.dynamic_symbols())
        .filter_map(|sym| sym.name().ok())
        .collect();
    Some(PROBE_TARGETS.iter().map(|t| t.symbol).filter(|s| names.contains(s)).collect())
}

/// Warn when the target itself defines none of the probed functions
///
/// Not fatal: the codec functions usually live in the shared media libraries,
/// which are probed separately.
fn check_probed_symbols(target_path: &Path, quiet: bool) -> Result<()> {
    if quiet {
        return Ok(());
    }

    let file_data = std::fs::read(target_path)
        .with_context(|| format!("Failed to read binary: {}", target_path.display()))?;

    match probed_symbols_in(&file_data) {
        // Not a valid object file, let attachment report it
        None => {}
        Some(found) if found.is_empty() => {
            eprintln!(
                "warning: {} defines none of the probed functions; relying on media libraries",
                target_path.display()
            );
        }
        Some(found) => log::info!("target defines {}", found.join(", ")),
    }

    Ok(())
}

/// The traced process must exist and have `binary` (or a probed media
/// library) mapped; otherwise the probes can never fire for it
///
/// # Errors
/// Returns [`ProfilerError::ProcessNotFound`] if the process is gone, or an
/// error if its memory maps are unreadable
pub fn check_target_process(pid: Pid, binary: &Path) -> Result<()> {
    if !process_alive(pid) {
        return Err(ProfilerError::ProcessNotFound(pid).into());
    }

    let maps_path = format!("/proc/{}/maps", pid.0);
    let maps = std::fs::read_to_string(&maps_path)
        .with_context(|| format!("Cannot read {maps_path} (permission denied? run with sudo)"))?;

    if !maps_mention(&maps, binary) {
        log::warn!("{} is not mapped by {pid}; only media library probes can fire", binary.display());
    }
    Ok(())
}

/// Whether any mapping in `/proc/<pid>/maps` content is backed by `path`
fn maps_mention(maps: &str, path: &Path) -> bool {
    let Some(path) = path.to_str() else {
        return false;
    };
    maps.lines().any(|line| line.split_whitespace().nth(5) == Some(path))
}
