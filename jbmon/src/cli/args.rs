//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::engine::PairingMode;

#[derive(Parser, Debug)]
#[command(
    name = "jbmon",
    version,
    about = "Per-thread latency and throughput of jitter-buffer and codec calls",
    after_help = "\
EXAMPLES:
    sudo jbmon my-player                        Auto-detect PID and binary
    sudo jbmon --pid 1234                       Explicit PID, auto-detect binary
    sudo jbmon --binary ./player                Every process running ./player
    sudo jbmon my-player --record calls.jsonl   Also record raw events
    jbmon --replay calls.jsonl --export out.json  Re-aggregate a recording (no root)"
)]
pub struct Args {
    /// Process name to monitor (auto-detects PID and binary)
    #[arg(value_name = "PROCESS", conflicts_with = "replay")]
    pub process: Option<String>,

    /// Process ID to monitor (binary path auto-detected from /proc)
    #[arg(short, long, conflicts_with = "replay")]
    pub pid: Option<i32>,

    /// Binary to attach to; without --pid every process running it is traced
    #[arg(short, long, conflicts_with = "replay")]
    pub binary: Option<PathBuf>,

    /// Seconds between periodic reports
    #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Write the final statistics to FILE as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Record every raw entry/exit event to FILE (JSON lines)
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,

    /// Aggregate a recorded event file instead of attaching probes
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// How exits are matched to entries
    #[arg(long, value_enum, default_value_t = PairingArg::LastWriteWins)]
    pub pairing: PairingArg,

    /// JSON file overriding per-function observation policies
    #[arg(long, value_name = "FILE")]
    pub policy_file: Option<PathBuf>,

    /// Print the effective policy table and exit
    #[arg(long)]
    pub list_policies: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PairingArg {
    /// A new entry overwrites the pending one (recursion-unsafe, cheapest)
    LastWriteWins,
    /// Nested entries are matched innermost-first
    CallStack,
}

impl From<PairingArg> for PairingMode {
    fn from(arg: PairingArg) -> Self {
        match arg {
            PairingArg::LastWriteWins => PairingMode::LastWriteWins,
            PairingArg::CallStack => PairingMode::CallStack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["jbmon", "player"]).unwrap();
        assert_eq!(args.process.as_deref(), Some("player"));
        assert_eq!(args.interval, 5);
        assert_eq!(args.duration, 0);
        assert_eq!(args.pairing, PairingArg::LastWriteWins);
    }

    #[test]
    fn test_replay_conflicts_with_targets() {
        assert!(Args::try_parse_from(["jbmon", "--replay", "t.jsonl", "--pid", "1"]).is_err());
        assert!(Args::try_parse_from(["jbmon", "--replay", "t.jsonl", "player"]).is_err());
        assert!(Args::try_parse_from(["jbmon", "--replay", "t.jsonl"]).is_ok());
    }

    #[test]
    fn test_pairing_value() {
        let args = Args::try_parse_from(["jbmon", "--pid", "1", "--pairing", "call-stack"]).unwrap();
        assert_eq!(PairingMode::from(args.pairing), PairingMode::CallStack);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Args::try_parse_from(["jbmon", "--pid", "1", "--interval", "0"]).is_err());
    }
}
