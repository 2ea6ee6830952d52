//! Resolve the traced process: name → PID, PID → binary, liveness.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Pid, ProfilerError};

/// A running process that matched a lookup
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub exe_path: PathBuf,
    pub command: String,
}

/// What to attach to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// `None` traces every process running `binary`
    pub pid: Option<Pid>,
    pub binary: PathBuf,
}

/// Find the single process whose command or executable matches `name`
///
/// # Errors
/// Fails when no process or more than one process matches
pub fn find_process_by_name(name: &str) -> Result<ProcessInfo> {
    let mut matches = scan_processes(name)?;

    match matches.len() {
        0 => bail!(
            "No process matching '{name}' found.\n\
             Check running processes with: ps aux | grep {name}"
        ),
        1 => Ok(matches.remove(0)),
        _ => {
            let list: Vec<String> =
                matches.iter().map(|m| format!("  {} ({})", m.pid.0, m.command)).collect();
            bail!(
                "Multiple processes match '{name}':\n{}\n\n\
                 Specify PID explicitly: jbmon --pid <PID>",
                list.join("\n")
            )
        }
    }
}

fn scan_processes(name: &str) -> Result<Vec<ProcessInfo>> {
    let mut matches = Vec::new();
    let own_pid = std::process::id();

    for entry in fs::read_dir("/proc").context("Failed to read /proc")?.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };
        if pid == own_pid {
            continue;
        }

        // Kernel threads have no exe link; inaccessible processes are skipped too
        let Ok(exe_path) = fs::read_link(format!("/proc/{pid}/exe")) else {
            continue;
        };
        let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
            continue;
        };
        let Some(command) = extract_comm(&stat) else {
            continue;
        };

        if is_match(&command, &exe_path, name) {
            matches.push(ProcessInfo { pid: Pid(pid), exe_path, command: command.to_string() });
        }
    }

    Ok(matches)
}

/// Resolve binary path from PID via `/proc/<pid>/exe`
///
/// # Errors
/// Returns [`ProfilerError::ProcessNotFound`] if the link cannot be read
pub fn resolve_exe_path(pid: Pid) -> Result<PathBuf, ProfilerError> {
    fs::read_link(format!("/proc/{}/exe", pid.0)).map_err(|_| ProfilerError::ProcessNotFound(pid))
}

/// Whether `pid` is still running
#[must_use]
pub fn process_alive(pid: Pid) -> bool {
    Path::new(&format!("/proc/{}", pid.0)).exists()
}

/// Build the attachment target from the CLI's process name, PID and binary
///
/// - name: PID and binary auto-detected
/// - PID: binary from `/proc/<pid>/exe` unless given
/// - binary alone: no PID filter
///
/// # Errors
/// Fails on conflicting or missing selectors and on lookup failures
pub fn resolve_target(
    process: Option<&str>,
    pid: Option<i32>,
    binary: Option<&Path>,
) -> Result<Target> {
    if let Some(name) = process {
        if pid.is_some() || binary.is_some() {
            bail!(
                "Cannot use PROCESS argument with --pid or --binary.\n\n\
                 Use either:\n  \
                 jbmon my-player          (auto-detect)\n  \
                 jbmon --pid 1234         (explicit PID)"
            );
        }
        let info = find_process_by_name(name)?;
        return Ok(Target { pid: Some(info.pid), binary: info.exe_path });
    }

    let binary = binary
        .map(|b| {
            fs::canonicalize(b).with_context(|| format!("Failed to resolve path: {}", b.display()))
        })
        .transpose()?;

    match (pid.map(Pid::from), binary) {
        (Some(pid), Some(binary)) => Ok(Target { pid: Some(pid), binary }),
        (Some(pid), None) => Ok(Target { pid: Some(pid), binary: resolve_exe_path(pid)? }),
        (None, Some(binary)) => Ok(Target { pid: None, binary }),
        (None, None) => bail!(
            "Missing required argument: PROCESS, --pid or --binary\n\n\
             Usage:\n  \
             jbmon my-player          Auto-detect PID and binary\n  \
             jbmon --pid 1234         Explicit PID, auto-detect binary\n  \
             jbmon --replay FILE      Aggregate a recorded trace\n\n\
             Run 'jbmon --help' for more options"
        ),
    }
}

/// Command name from `/proc/<pid>/stat` ("pid (comm) state ...")
fn extract_comm(stat_line: &str) -> Option<&str> {
    let open = stat_line.find('(')?;
    let close = stat_line.rfind(')')?;
    (open < close).then(|| &stat_line[open + 1..close])
}

fn is_match(command: &str, exe_path: &Path, pattern: &str) -> bool {
    let exe_basename = exe_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let pattern_basename =
        Path::new(pattern).file_name().and_then(|n| n.to_str()).unwrap_or(pattern);

    command == pattern_basename
        || exe_basename == pattern_basename
        || command.contains(pattern)
        || exe_basename.contains(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_comm() {
        let stat = "1234 (player) S 1 1234 1234 0 -1 4194304";
        assert_eq!(extract_comm(stat), Some("player"));
    }

    #[test]
    fn test_extract_comm_with_parens() {
        let stat = "1234 (player (hw)) S 1 1234";
        assert_eq!(extract_comm(stat), Some("player (hw)"));
    }

    #[test]
    fn test_is_match() {
        let exe = Path::new("/usr/bin/rtp-player");
        assert!(is_match("rtp-player", exe, "rtp-player"));
        assert!(is_match("rtp-player", exe, "/opt/build/rtp-player"));
        assert!(is_match("rtp-player", exe, "player"));
        assert!(!is_match("rtp-player", exe, "encoder"));
    }

    #[test]
    fn test_missing_selector_is_usage_error() {
        let err = resolve_target(None, None, None).unwrap_err().to_string();
        assert!(err.starts_with("Missing required argument"));
    }

    #[test]
    fn test_binary_only_has_no_pid_filter() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let target = resolve_target(None, None, Some(file.path())).unwrap();
        assert_eq!(target.pid, None);
        assert_eq!(target.binary, fs::canonicalize(file.path()).unwrap());
    }

    #[test]
    fn test_own_process_is_alive() {
        assert!(process_alive(Pid(std::process::id())));
    }
}
