//! # eBPF Kernel-Side Instrumentation
//!
//! Uprobes and uretprobes on jitter-buffer and codec library functions. Every
//! probed function gets a `{stem}_entry` and a `{stem}_return` program; both
//! emit a [`CallEvent`] into the ring buffer and leave pairing to userspace.
//!
//! ## Maps (Shared with Userspace)
//!
//! - `EVENTS` - Ring buffer (1MB) for the call event stream
//! - `PENDING_BYTES` - Byte size stashed at entry, consumed at return
//! - `CONFIG` - Runtime configuration (target PID)
//! - `EVENTS_OUTPUT_FAILED` - Ring buffer overflow counter
//!
//! ## Build
//!
//! Always compiled in release mode:
//! ```bash
//! cargo xtask build-ebpf --release
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use aya_ebpf::{
    helpers::{bpf_get_current_pid_tgid, bpf_ktime_get_ns, bpf_probe_read_user},
    macros::{map, uprobe, uretprobe},
    maps::{HashMap, RingBuf},
    programs::{ProbeContext, RetProbeContext},
};
use aya_log_ebpf::warn;
use jbmon_common::{
    ByteArg, CallEvent, PendingKey, CONFIG_TARGET_PID, EVENT_ENTRY, EVENT_EXIT,
    FLAG_HAS_BYTE_SIZE, FLAG_HAS_RETURN_CODE, FN_AVCODEC_RECEIVE_FRAME, FN_AVCODEC_SEND_PACKET,
    FN_AV_BSF_RECEIVE_PACKET, FN_AV_BSF_SEND_PACKET, FN_AV_PACKET_ALLOC, FN_AV_PACKET_REF,
    FN_AV_PACKET_UNREF, FN_JITTERBUFFER_GET, FN_JITTERBUFFER_PUT, FN_RTP_PARSE_PACKET,
};

// ============================================================================
// eBPF Maps - Shared data structures between kernel and userspace
// ============================================================================

/// Ring buffer for sending call events to userspace
///
/// - **Size**: 1MB (~21k events)
/// - **Usage**: Kernel writes with `EVENTS.output()`, userspace reads with `ring_buf.next()`
#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(1024 * 1024, 0);

/// Map: (TID, function id) → byte size read at entry
///
/// Entries are removed by the matching return probe. Calls that never return
/// leave a stale slot behind, which the next entry on that thread overwrites.
#[map]
static PENDING_BYTES: HashMap<PendingKey, u64> = HashMap::with_max_entries(8192, 0);

/// Map: Config key → Config value
///
/// - **Key 0**: Target PID (0 = every process that maps the probed objects)
#[map]
static CONFIG: HashMap<u32, u64> = HashMap::with_max_entries(16, 0);

/// Number of events dropped because the ring buffer was full
#[map]
static EVENTS_OUTPUT_FAILED: HashMap<u32, u64> = HashMap::with_max_entries(1, 0);

// ============================================================================
// Program generation
// ============================================================================

/// Declare the entry/return program pair of one probed function
macro_rules! call_probes {
    ($entry:ident, $ret:ident, $function_id:expr, $byte_arg:expr) => {
        #[uprobe]
        pub fn $entry(ctx: ProbeContext) -> u32 {
            match try_on_entry(&ctx, $function_id, $byte_arg) {
                Ok(()) => 0,
                Err(_) => 1,
            }
        }

        #[uretprobe]
        pub fn $ret(ctx: RetProbeContext) -> u32 {
            match try_on_return(&ctx, $function_id, $byte_arg) {
                Ok(()) => 0,
                Err(_) => 1,
            }
        }
    };
}

call_probes!(jitterbuffer_put_entry, jitterbuffer_put_return, FN_JITTERBUFFER_PUT, ByteArg::PointerU64(0));
call_probes!(jitterbuffer_get_entry, jitterbuffer_get_return, FN_JITTERBUFFER_GET, ByteArg::None);
call_probes!(rtp_parse_packet_entry, rtp_parse_packet_return, FN_RTP_PARSE_PACKET, ByteArg::PointerU32(1));
call_probes!(avcodec_send_packet_entry, avcodec_send_packet_return, FN_AVCODEC_SEND_PACKET, ByteArg::None);
call_probes!(avcodec_receive_frame_entry, avcodec_receive_frame_return, FN_AVCODEC_RECEIVE_FRAME, ByteArg::None);
call_probes!(av_packet_alloc_entry, av_packet_alloc_return, FN_AV_PACKET_ALLOC, ByteArg::None);
call_probes!(av_packet_ref_entry, av_packet_ref_return, FN_AV_PACKET_REF, ByteArg::None);
call_probes!(av_packet_unref_entry, av_packet_unref_return, FN_AV_PACKET_UNREF, ByteArg::None);
call_probes!(av_bsf_send_packet_entry, av_bsf_send_packet_return, FN_AV_BSF_SEND_PACKET, ByteArg::None);
call_probes!(av_bsf_receive_packet_entry, av_bsf_receive_packet_return, FN_AV_BSF_RECEIVE_PACKET, ByteArg::None);

// ============================================================================
// Probe bodies
// ============================================================================

fn try_on_entry(ctx: &ProbeContext, function_id: u32, byte_arg: ByteArg) -> Result<(), i64> {
    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    let pid = (pid_tgid >> 32) as u32;
    let tid = pid_tgid as u32;

    if !is_target(pid) {
        return Ok(());
    }

    let timestamp_ns = unsafe { bpf_ktime_get_ns() };

    // A null or unreadable pointer counts as zero bytes
    let byte_size = match byte_arg {
        ByteArg::None => None,
        ByteArg::PointerU64(n) => {
            let ptr: *const u64 = ctx.arg(n).ok_or(1i64)?;
            Some(if ptr.is_null() { 0 } else { unsafe { bpf_probe_read_user(ptr).unwrap_or(0) } })
        }
        ByteArg::PointerU32(n) => {
            let ptr: *const u32 = ctx.arg(n).ok_or(1i64)?;
            Some(if ptr.is_null() {
                0
            } else {
                u64::from(unsafe { bpf_probe_read_user(ptr).unwrap_or(0) })
            })
        }
    };

    if let Some(bytes) = byte_size {
        let key = PendingKey { tid, function_id };
        if unsafe { PENDING_BYTES.insert(&key, &bytes, 0) }.is_err() {
            // The exit still fires; it just carries no byte size
            warn!(ctx, "PENDING_BYTES full, byte size of tid {} lost", tid);
        }
    }

    emit(CallEvent {
        pid,
        tid,
        timestamp_ns,
        function_id,
        event_type: EVENT_ENTRY,
        byte_size: 0,
        return_code: 0,
        flags: 0,
        _padding: [0u8; 7],
    })
}

fn try_on_return(ctx: &RetProbeContext, function_id: u32, byte_arg: ByteArg) -> Result<(), i64> {
    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    let pid = (pid_tgid >> 32) as u32;
    let tid = pid_tgid as u32;

    if !is_target(pid) {
        return Ok(());
    }

    let timestamp_ns = unsafe { bpf_ktime_get_ns() };
    let mut flags = 0u8;

    // C `int`: the upper half of the return register is unspecified
    let return_code = match ctx.ret::<i32>() {
        Some(rc) => {
            flags |= FLAG_HAS_RETURN_CODE;
            i64::from(rc)
        }
        None => 0,
    };

    let mut byte_size = 0u64;
    if byte_arg != ByteArg::None {
        let key = PendingKey { tid, function_id };
        if let Some(bytes) = unsafe { PENDING_BYTES.get(&key).copied() } {
            byte_size = bytes;
            flags |= FLAG_HAS_BYTE_SIZE;
            let _ = unsafe { PENDING_BYTES.remove(&key) };
        }
    }

    emit(CallEvent {
        pid,
        tid,
        timestamp_ns,
        function_id,
        event_type: EVENT_EXIT,
        byte_size,
        return_code,
        flags,
        _padding: [0u8; 7],
    })
}

// Helper: Check the PID filter written by userspace
fn is_target(pid: u32) -> bool {
    let target = unsafe { CONFIG.get(&CONFIG_TARGET_PID).copied().unwrap_or(0) };
    target == 0 || target == u64::from(pid)
}

fn emit(event: CallEvent) -> Result<(), i64> {
    let result = unsafe { EVENTS.output(&event, 0) };

    if result.is_err() {
        unsafe {
            let key = 0u32;
            let current = EVENTS_OUTPUT_FAILED.get(&key).copied().unwrap_or(0);
            let _ = EVENTS_OUTPUT_FAILED.insert(&key, &(current + 1), 0);
        }
    }

    result.map_err(|_| 1i64)
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
