//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a TID where a
//! PID is expected, and make function signatures more expressive.

use jbmon_common::FUNCTION_NAME_LEN;
use std::fmt;

/// Process ID (TGID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

#[allow(clippy::cast_sign_loss)]
impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid as u32)
    }
}

#[allow(clippy::cast_possible_wrap)]
impl From<Pid> for i32 {
    fn from(pid: Pid) -> Self {
        pid.0 as i32
    }
}

/// Thread ID
///
/// Together with the PID and function name it forms an aggregation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Name of an instrumented call site, bounded to [`FunctionName::MAX_LEN`] bytes
///
/// The bound mirrors the kernel-side name buffer. Longer names are cut at the
/// last UTF-8 character boundary that fits, so the same input always yields
/// the same name and therefore the same aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionName(String);

impl FunctionName {
    /// Longest name kept, in bytes (buffer size minus the NUL terminator)
    pub const MAX_LEN: usize = FUNCTION_NAME_LEN - 1;

    /// Create a function name, truncating it to [`Self::MAX_LEN`] bytes
    pub fn new(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if name.len() > Self::MAX_LEN {
            let mut end = Self::MAX_LEN;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        Self(name)
    }

    /// Get the function name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FunctionName {
    fn from(s: String) -> Self {
        FunctionName::new(s)
    }
}

impl From<&str> for FunctionName {
    fn from(s: &str) -> Self {
        FunctionName::new(s)
    }
}

/// Aggregation key: one (process, thread, function) statistics stream
///
/// Two keys are the same unit iff all three fields match. The derived
/// ordering (pid, tid, function) is the order snapshots are returned in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentationKey {
    pub pid: Pid,
    pub tid: Tid,
    pub function: FunctionName,
}

impl InstrumentationKey {
    pub fn new(pid: u32, tid: u32, function: impl Into<FunctionName>) -> Self {
        Self { pid: Pid(pid), tid: Tid(tid), function: function.into() }
    }
}

impl fmt::Display for InstrumentationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.pid, self.tid, self.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_kept_verbatim() {
        let name = FunctionName::new("avcodec_send_packet");
        assert_eq!(name.as_str(), "avcodec_send_packet");
    }

    #[test]
    fn test_long_name_truncated_to_bound() {
        let long = "x".repeat(100);
        let name = FunctionName::new(long.clone());
        assert_eq!(name.as_str().len(), FunctionName::MAX_LEN);
        // Same input, same key
        assert_eq!(name, FunctionName::new(long));
    }

    #[test]
    fn test_names_differing_past_bound_collapse() {
        let base = "a".repeat(FunctionName::MAX_LEN);
        let one = FunctionName::new(format!("{base}_one"));
        let two = FunctionName::new(format!("{base}_two"));
        assert_eq!(one, two);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        // 62 ASCII bytes followed by a 3-byte character straddling the bound
        let name = FunctionName::new(format!("{}€tail", "a".repeat(62)));
        assert_eq!(name.as_str(), "a".repeat(62));
    }

    #[test]
    fn test_key_identity_requires_all_fields() {
        let base = InstrumentationKey::new(100, 1, "decode");
        assert_eq!(base, InstrumentationKey::new(100, 1, "decode"));
        assert_ne!(base, InstrumentationKey::new(101, 1, "decode"));
        assert_ne!(base, InstrumentationKey::new(100, 2, "decode"));
        assert_ne!(base, InstrumentationKey::new(100, 1, "encode"));
    }

    #[test]
    fn test_key_display() {
        let key = InstrumentationKey::new(100, 1, "decode");
        assert_eq!(key.to_string(), "PID:100 TID:1 decode");
    }
}
