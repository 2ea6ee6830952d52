//! Domain model for jbmon
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Deterministic, bounded aggregation keys
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{FunctionName, InstrumentationKey, Pid, Tid};

pub use errors::{ConfigError, ExportError, ProfilerError, ReplayError};
