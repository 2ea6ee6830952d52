//! # Shared Data Structures (eBPF ↔ Userspace)
//!
//! Defines the call event emitted by the kernel-side uprobes and the table of
//! probed functions. All types use `#[repr(C)]` for consistent memory layout
//! across the kernel/userspace boundary.
//!
//! ## Key Types
//!
//! - [`CallEvent`] - Entry or exit notification passed via ring buffer
//! - [`ProbeTarget`] - One probed function: symbol, program names, byte argument
//! - [`PendingKey`] - Per-thread slot for arguments stashed between entry and return

#![no_std]

// ============================================================================
// Event Type Constants
// ============================================================================

/// Function entry (uprobe fired)
///
/// Paired with: `EVENT_EXIT` for the same (pid, tid, function)
pub const EVENT_ENTRY: u32 = 1;

/// Function return (uretprobe fired)
///
/// Paired with: `EVENT_ENTRY`
pub const EVENT_EXIT: u32 = 2;

/// `CallEvent::flags` bit: `byte_size` was read from the probed argument
pub const FLAG_HAS_BYTE_SIZE: u8 = 0b01;

/// `CallEvent::flags` bit: `return_code` holds the function's return value
pub const FLAG_HAS_RETURN_CODE: u8 = 0b10;

/// Size of the function name buffer, NUL terminator included.
///
/// Names longer than `FUNCTION_NAME_LEN - 1` bytes are truncated before they
/// become part of an aggregation key.
pub const FUNCTION_NAME_LEN: usize = 64;

// ============================================================================
// Config Map Keys
// ============================================================================

/// `CONFIG[CONFIG_TARGET_PID]`: only emit events for this TGID (0 = all)
pub const CONFIG_TARGET_PID: u32 = 0;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Event sent from eBPF to userspace via ring buffer
///
/// **Memory Layout**: `#[repr(C)]`, 48 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct CallEvent {
    /// Process ID (TGID in Linux terms)
    pub pid: u32,

    /// Thread ID (PID in Linux terms)
    pub tid: u32,

    /// Timestamp in nanoseconds (from `bpf_ktime_get_ns()`)
    ///
    /// Monotonic clock, relative to system boot.
    pub timestamp_ns: u64,

    /// Index into [`PROBE_TARGETS`]
    pub function_id: u32,

    /// `EVENT_ENTRY` or `EVENT_EXIT`
    pub event_type: u32,

    /// Value read through the byte-size argument pointer (exit events only)
    ///
    /// Meaningful when `flags & FLAG_HAS_BYTE_SIZE` is set.
    pub byte_size: u64,

    /// C `int` return value widened to 64 bits (exit events only)
    ///
    /// Every probed function with a meaningful result returns `int`, whose
    /// upper 32 register bits are unspecified; only the low 32 bits count.
    /// Meaningful when `flags & FLAG_HAS_RETURN_CODE` is set.
    pub return_code: i64,

    /// Bitset of `FLAG_*` constants
    pub flags: u8,

    /// Padding for 8-byte alignment
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: [u8; 7],
}

impl CallEvent {
    #[must_use]
    pub fn byte_size(&self) -> Option<u64> {
        (self.flags & FLAG_HAS_BYTE_SIZE != 0).then_some(self.byte_size)
    }

    /// Return code as the C `int` the function produced
    ///
    /// Only the low 32 bits are read, so a zero-extended register holding a
    /// negative `int` still yields the negative value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn return_code(&self) -> Option<i64> {
        (self.flags & FLAG_HAS_RETURN_CODE != 0).then_some(i64::from(self.return_code as i32))
    }
}

/// Key of the `PENDING_BYTES` map
///
/// Argument registers are clobbered by the time the uretprobe fires, so the
/// entry probe stashes the byte size here and the return probe consumes it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingKey {
    pub tid: u32,
    pub function_id: u32,
}

/// How the entry probe finds the byte size of the unit of work
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteArg {
    /// The function carries no byte size
    None,
    /// Argument `n` points to a `u64`
    PointerU64(usize),
    /// Argument `n` points to a `u32`
    PointerU32(usize),
}

/// One probed function
#[derive(Clone, Copy, Debug)]
pub struct ProbeTarget {
    /// Symbol to attach to
    pub symbol: &'static str,

    /// Program name prefix: programs are `{stem}_entry` and `{stem}_return`
    pub program_stem: &'static str,

    /// Byte-size extraction for the entry probe
    pub byte_arg: ByteArg,
}

pub const FN_JITTERBUFFER_PUT: u32 = 0;
pub const FN_JITTERBUFFER_GET: u32 = 1;
pub const FN_RTP_PARSE_PACKET: u32 = 2;
pub const FN_AVCODEC_SEND_PACKET: u32 = 3;
pub const FN_AVCODEC_RECEIVE_FRAME: u32 = 4;
pub const FN_AV_PACKET_ALLOC: u32 = 5;
pub const FN_AV_PACKET_REF: u32 = 6;
pub const FN_AV_PACKET_UNREF: u32 = 7;
pub const FN_AV_BSF_SEND_PACKET: u32 = 8;
pub const FN_AV_BSF_RECEIVE_PACKET: u32 = 9;

/// Probed functions, indexed by `CallEvent::function_id`
pub const PROBE_TARGETS: [ProbeTarget; 10] = [
    ProbeTarget {
        symbol: "jitterbuffer_put",
        program_stem: "jitterbuffer_put",
        byte_arg: ByteArg::PointerU64(0),
    },
    ProbeTarget {
        symbol: "jitterbuffer_get",
        program_stem: "jitterbuffer_get",
        byte_arg: ByteArg::None,
    },
    ProbeTarget {
        symbol: "rtp_parse_packet",
        program_stem: "rtp_parse_packet",
        byte_arg: ByteArg::PointerU32(1),
    },
    ProbeTarget {
        symbol: "avcodec_send_packet",
        program_stem: "avcodec_send_packet",
        byte_arg: ByteArg::None,
    },
    ProbeTarget {
        symbol: "avcodec_receive_frame",
        program_stem: "avcodec_receive_frame",
        byte_arg: ByteArg::None,
    },
    ProbeTarget {
        symbol: "av_packet_alloc",
        program_stem: "av_packet_alloc",
        byte_arg: ByteArg::None,
    },
    ProbeTarget { symbol: "av_packet_ref", program_stem: "av_packet_ref", byte_arg: ByteArg::None },
    ProbeTarget {
        symbol: "av_packet_unref",
        program_stem: "av_packet_unref",
        byte_arg: ByteArg::None,
    },
    ProbeTarget {
        symbol: "av_bsf_send_packet",
        program_stem: "av_bsf_send_packet",
        byte_arg: ByteArg::None,
    },
    ProbeTarget {
        symbol: "av_bsf_receive_packet",
        program_stem: "av_bsf_receive_packet",
        byte_arg: ByteArg::None,
    },
];

/// Look up a probed function by id
#[must_use]
pub fn probe_target(function_id: u32) -> Option<&'static ProbeTarget> {
    PROBE_TARGETS.get(function_id as usize)
}

#[cfg(feature = "user")]
use aya::Pod;

// Required for reading events out of the ring buffer and writing map keys
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for CallEvent {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for PendingKey {}
