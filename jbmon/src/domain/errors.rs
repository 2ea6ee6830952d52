//! Structured error types for jbmon
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! The aggregation engine itself has no error paths; these cover the layers
//! around it (attachment, export, replay, configuration).

use super::types::Pid;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Failed to load eBPF program: {0}")]
    EbpfLoadFailed(String),

    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("eBPF program {0} not found in object")]
    ProgramNotFound(String),

    #[error("No probes could be attached to {binary} or its media libraries")]
    NoProbesAttached { binary: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write snapshot: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Malformed event on line {line}: {source}")]
    MalformedEvent { line: usize, source: serde_json::Error },

    #[error("Failed to read trace {path}: {source}")]
    ReadFailed { path: PathBuf, source: std::io::Error },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read policy file {path}: {source}")]
    PolicyFileUnreadable { path: PathBuf, source: std::io::Error },

    #[error("Invalid policy file {path}: {source}")]
    PolicyFileInvalid { path: PathBuf, source: serde_json::Error },
}
