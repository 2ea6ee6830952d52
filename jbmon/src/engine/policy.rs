//! Observation policies: which parts of an exit event count for a function.
//!
//! Per-call-site differences live in a [`PolicyTable`] keyed by function
//! name. Instrumenting a new function means adding a table entry (or a line
//! in a policy file), never touching the aggregation code.
//!
//! # Policy file
//!
//! ```json
//! {
//!   "default": "latency-only",
//!   "functions": {
//!     "decode": "signed-return",
//!     "demux": { "counts_work": true, "byte_size": true, "outcome": "none" }
//!   }
//! }
//! ```
//!
//! Entries overlay the built-in table; both keys are optional.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::domain::{ConfigError, FunctionName};

/// How an exit's return code maps to success or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeRule {
    /// No outcome signal: always succeeded
    #[default]
    None,
    /// Negative return code is a failure; zero or positive is a success
    SignedReturn,
}

impl OutcomeRule {
    /// Classify an exit. A missing code counts as success.
    #[must_use]
    pub fn succeeded(self, outcome_code: Option<i64>) -> bool {
        match self {
            Self::None => true,
            Self::SignedReturn => outcome_code.map_or(true, |rc| rc >= 0),
        }
    }
}

/// Which fields of an exit event a function's statistics use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservationPolicy {
    /// Each exit is one unit of work (`packet_count += 1`)
    #[serde(default)]
    pub counts_work: bool,
    /// Fold the exit's byte size into `total_bytes` (only with `counts_work`)
    #[serde(default)]
    pub byte_size: bool,
    /// Outcome classification of the exit
    #[serde(default)]
    pub outcome: OutcomeRule,
}

impl ObservationPolicy {
    /// Only the entry/exit latency (allocation, ref/unref style calls)
    pub const LATENCY_ONLY: Self =
        Self { counts_work: false, byte_size: false, outcome: OutcomeRule::None };

    /// Counts work and bytes, no failure signal
    pub const WORK_ONLY: Self =
        Self { counts_work: true, byte_size: true, outcome: OutcomeRule::None };

    /// Counts work, negative return is a drop
    pub const SIGNED_RETURN: Self =
        Self { counts_work: true, byte_size: false, outcome: OutcomeRule::SignedReturn };

    /// Negative return is a drop, successes are not counted as work
    pub const FAILURES_ONLY: Self =
        Self { counts_work: false, byte_size: false, outcome: OutcomeRule::SignedReturn };
}

/// Named policy shapes accepted in policy files and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyShape {
    LatencyOnly,
    WorkOnly,
    SignedReturn,
    FailuresOnly,
}

impl From<PolicyShape> for ObservationPolicy {
    fn from(shape: PolicyShape) -> Self {
        match shape {
            PolicyShape::LatencyOnly => Self::LATENCY_ONLY,
            PolicyShape::WorkOnly => Self::WORK_ONLY,
            PolicyShape::SignedReturn => Self::SIGNED_RETURN,
            PolicyShape::FailuresOnly => Self::FAILURES_ONLY,
        }
    }
}

/// A policy as written in a file: a shape name or explicit flags
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum PolicySpec {
    Shape(PolicyShape),
    Explicit(ObservationPolicy),
}

impl From<PolicySpec> for ObservationPolicy {
    fn from(spec: PolicySpec) -> Self {
        match spec {
            PolicySpec::Shape(shape) => shape.into(),
            PolicySpec::Explicit(policy) => policy,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    default: Option<PolicySpec>,
    #[serde(default)]
    functions: HashMap<String, PolicySpec>,
}

/// Function name → observation policy, with a fallback for unlisted functions
///
/// Built once at startup and immutable while a session runs.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<FunctionName, ObservationPolicy>,
    default: ObservationPolicy,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PolicyTable {
    /// Empty table: every function gets `default`
    #[must_use]
    pub fn new(default: ObservationPolicy) -> Self {
        Self { policies: HashMap::new(), default }
    }

    /// The jitter-buffer and codec functions probed by the eBPF programs
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(ObservationPolicy::LATENCY_ONLY)
            .with("jitterbuffer_put", ObservationPolicy::WORK_ONLY)
            .with("jitterbuffer_get", ObservationPolicy::FAILURES_ONLY)
            .with("rtp_parse_packet", ObservationPolicy::WORK_ONLY)
            .with("avcodec_send_packet", ObservationPolicy::SIGNED_RETURN)
            .with("avcodec_receive_frame", ObservationPolicy::FAILURES_ONLY)
            .with("av_packet_alloc", ObservationPolicy::LATENCY_ONLY)
            .with("av_packet_ref", ObservationPolicy::LATENCY_ONLY)
            .with("av_packet_unref", ObservationPolicy::LATENCY_ONLY)
            .with("av_bsf_send_packet", ObservationPolicy::SIGNED_RETURN)
            .with("av_bsf_receive_packet", ObservationPolicy::SIGNED_RETURN)
    }

    /// Builder form of [`Self::insert`]
    #[must_use]
    pub fn with(mut self, function: impl Into<FunctionName>, policy: ObservationPolicy) -> Self {
        self.insert(function, policy);
        self
    }

    pub fn insert(&mut self, function: impl Into<FunctionName>, policy: ObservationPolicy) {
        self.policies.insert(function.into(), policy);
    }

    /// Policy for `function`, or the default if it is not listed
    #[must_use]
    pub fn lookup(&self, function: &FunctionName) -> ObservationPolicy {
        self.policies.get(function).copied().unwrap_or(self.default)
    }

    #[must_use]
    pub fn default_policy(&self) -> ObservationPolicy {
        self.default
    }

    /// Listed functions, sorted by name
    #[must_use]
    pub fn entries(&self) -> Vec<(&FunctionName, ObservationPolicy)> {
        let mut entries: Vec<_> = self.policies.iter().map(|(name, p)| (name, *p)).collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Overlay a JSON policy document onto this table
    ///
    /// # Errors
    /// Returns the parse error if the document is not a valid policy file
    pub fn merge_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let file: PolicyFile = serde_json::from_str(json)?;
        if let Some(default) = file.default {
            self.default = default.into();
        }
        for (function, spec) in file.functions {
            debug!("policy override: {function} = {spec:?}");
            self.insert(function, spec.into());
        }
        Ok(())
    }

    /// Built-in table overlaid with the policy file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid policy file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| {
            ConfigError::PolicyFileUnreadable { path: path.to_path_buf(), source }
        })?;
        let mut table = Self::builtin();
        table
            .merge_json(&json)
            .map_err(|source| ConfigError::PolicyFileInvalid { path: path.to_path_buf(), source })?;
        Ok(table)
    }
}
