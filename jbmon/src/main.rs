//! # jbmon - Main Entry Point
//!
//! Supports two operational modes:
//! - **Live** (`jbmon <PROCESS>`, `--pid <PID>` or `--binary <PATH>`): attach
//!   probes and report every `--interval` seconds
//! - **Replay** (`--replay calls.jsonl`): aggregate a recorded trace, no eBPF

// Main function is intentionally long for clarity
#![allow(clippy::too_many_lines)]

use anyhow::{Context, Result};
use aya::maps::RingBuf;
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jbmon::cli::Args;
use jbmon::engine::{PairingMode, PolicyTable, Session, SessionConfig};
use jbmon::export::{EventRecorder, SnapshotExporter};
use jbmon::preflight::{check_target_process, run_preflight_checks};
use jbmon::process_lookup::{process_alive, resolve_target};
use jbmon::profiling::{
    attach_call_probes, display_report, display_statistics, init_ebpf_logger, load_ebpf_program,
    print_ring_buffer_diagnostics, probe_objects, set_target_pid, EventProcessor,
};
use jbmon::trace_data::{load_trace, replay};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

type Recorder = Arc<EventRecorder<BufWriter<File>>>;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("missing required argument") || msg.contains("cannot use process") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Built-in policies, overlaid with `--policy-file` if given
fn load_policies(args: &Args) -> Result<PolicyTable> {
    match &args.policy_file {
        Some(path) => Ok(PolicyTable::load(path)?),
        None => Ok(PolicyTable::builtin()),
    }
}

fn print_policies(policies: &PolicyTable) {
    println!("default: {:?}", policies.default_policy());
    for (function, policy) in policies.entries() {
        println!("{function}: {policy:?}");
    }
}

/// Session wired to an event recorder when `--record` is set
fn build_session(args: &Args, policies: PolicyTable) -> Result<(Session, Option<Recorder>)> {
    let pairing = PairingMode::from(args.pairing);
    let mut session = Session::new(SessionConfig { policies, pairing });

    let recorder = args
        .record
        .as_deref()
        .map(|path| -> Result<Recorder> {
            let recorder = Arc::new(
                EventRecorder::create(path).context("Failed to create event record file")?,
            );
            session.set_event_sink(Box::new(Arc::clone(&recorder)));
            Ok(recorder)
        })
        .transpose()?;

    Ok((session, recorder))
}

/// Final report, export and recorder flush shared by both modes
fn finish(session: &Session, args: &Args, recorder: Option<&Recorder>) -> Result<()> {
    let snapshot = session.snapshot();
    display_report(&snapshot);

    if let Some(export_path) = &args.export {
        SnapshotExporter::new(&snapshot, session.pairing().name())
            .export_to_file(export_path)
            .context("Failed to export statistics")?;
        if !args.quiet {
            println!("saved: {}", export_path.display());
        }
    }

    if let Some(recorder) = recorder {
        recorder.flush().context("Failed to flush event record")?;
        if recorder.failed() > 0 {
            eprintln!("warning: {} events could not be recorded", recorder.failed());
        }
        if !args.quiet {
            if let Some(path) = &args.record {
                println!("recorded: {} events to {}", recorder.written(), path.display());
            }
        }
    }

    Ok(())
}

fn run_replay(args: &Args, trace_path: &Path, policies: PolicyTable) -> Result<()> {
    let events = load_trace(trace_path)?;
    let (session, recorder) = build_session(args, policies)?;

    let started = Instant::now();
    let stats = replay(&session, &events);
    if !args.quiet {
        eprintln!(
            "replayed: {} entries, {} exits in {:.1}ms",
            stats.entries,
            stats.exits,
            started.elapsed().as_secs_f64() * 1_000.0
        );
    }

    finish(&session, args, recorder.as_ref())
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    let policies = load_policies(&args)?;
    if args.list_policies {
        print_policies(&policies);
        return Ok(());
    }

    if let Some(trace_path) = args.replay.clone() {
        return run_replay(&args, &trace_path, policies);
    }

    // Live monitoring
    let target = resolve_target(args.process.as_deref(), args.pid, args.binary.as_deref())?;

    // Run pre-flight checks before anything else
    run_preflight_checks(&target.binary, quiet)?;
    if let Some(pid) = target.pid {
        check_target_process(pid, &target.binary)?;
    }

    if !quiet {
        println!("jbmon v{}", env!("CARGO_PKG_VERSION"));
        println!("target: {}", target.binary.display());
        match target.pid {
            Some(pid) => println!("pid: {}", pid.0),
            None => println!("pid: all"),
        }
    }

    let mut bpf = load_ebpf_program()?;
    init_ebpf_logger(&mut bpf);
    set_target_pid(&mut bpf, target.pid)?;

    let objects = probe_objects(&target.binary);
    let attached = attach_call_probes(&mut bpf, &objects, target.pid)?;
    if !quiet {
        println!("probes: {} attached across {} objects", attached.len(), objects.len());
    }

    let mut ring_buf = RingBuf::try_from(bpf.take_map("EVENTS").context("map not found")?)?;

    let (session, recorder) = build_session(&args, policies)?;
    let mut processor = EventProcessor::new(&session);

    if !quiet {
        if let Some(ref export_path) = args.export {
            println!("export: {}", export_path.display());
        }
        println!("pairing: {}", session.pairing().name());
    }

    let mut last_status_time = Instant::now();
    let mut report_timer = Instant::now();
    let report_interval = Duration::from_secs(args.interval);

    // Setup Ctrl+C handler
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let monitoring_start = Instant::now();
    let duration_limit =
        if args.duration > 0 { Some(Duration::from_secs(args.duration)) } else { None };

    let mut exit_reason = "interrupted";

    loop {
        if let Some(limit) = duration_limit {
            if monitoring_start.elapsed() >= limit {
                exit_reason = "duration limit reached";
                break;
            }
        }

        if let Some(pid) = target.pid {
            if !process_alive(pid) {
                exit_reason = "process exited";
                break;
            }
        }

        if processor.stats.total() == 0 && last_status_time.elapsed() > Duration::from_secs(10) {
            info!("Still waiting for events... (no calls observed yet)");
            last_status_time = Instant::now();
        }

        while let Some(item) = ring_buf.next() {
            processor.process_bytes(&item);
        }

        if report_timer.elapsed() >= report_interval {
            display_report(&session.snapshot());
            report_timer = Instant::now();
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    // Pick up whatever arrived after the last poll
    while let Some(item) = ring_buf.next() {
        processor.process_bytes(&item);
    }

    if !quiet {
        eprintln!(
            "\n{exit_reason}: {:.1}s, {} events, {} keys",
            monitoring_start.elapsed().as_secs_f64(),
            processor.stats.total(),
            session.key_count()
        );
        display_statistics(&processor.stats);
    }

    print_ring_buffer_diagnostics(&bpf)?;

    finish(&session, &args, recorder.as_ref())
}
