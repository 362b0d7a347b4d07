// src/error.rs
//
// Error types for setup failures and cache control.

use std::path::PathBuf;
use thiserror::Error;

/// Setup-level failures; any of these aborts a run before results exist.
#[derive(Error, Debug)]
pub enum IoReplayError {
    #[error("cannot open trace {path}: {source}")]
    TraceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open target {path}: {source}")]
    TargetOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no valid requests were loaded")]
    NoOperations,

    #[error("cannot allocate {size} byte buffer aligned to {align}")]
    Allocation { size: usize, align: usize },

    #[error("usage: {0}")]
    Usage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Cache purge failures; callers log these and keep going.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("flush failed: {0}")]
    Flush(#[source] std::io::Error),

    #[error("cache control {path} unavailable: {source}")]
    ControlUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache drop rejected (need root?): {0}")]
    DropRejected(#[source] std::io::Error),

    #[error("cache bypass not supported on this platform")]
    Unsupported,
}
