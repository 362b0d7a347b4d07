// src/sample_log.rs
//
//! Raw sample logging
//!
//! One value per line, so the files load directly into plotting scripts.
//! Names ending in `.zst` are zstd-compressed.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::replay::ReplayOutcome;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

fn write_lines<P, I, T>(path: P, values: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = T>,
    T: Display,
{
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "zst") {
        let mut encoder = zstd::stream::write::Encoder::new(file, 0)?;
        for value in values {
            writeln!(encoder, "{}", value)?;
        }
        encoder.finish()?;
    } else {
        let mut writer = BufWriter::new(file);
        for value in values {
            writeln!(writer, "{}", value)?;
        }
        writer.flush()?;
    }
    Ok(())
}

/// One latency (or any integer sample) per line
pub fn log_times<P: AsRef<Path>>(path: P, samples: &[u64]) -> Result<()> {
    write_lines(path, samples)
}

/// One local timestamp per line, microsecond precision
pub fn log_timestamps<P: AsRef<Path>>(path: P, stamps: &[DateTime<Local>]) -> Result<()> {
    write_lines(path, stamps.iter().map(format_timestamp))
}

pub fn format_timestamp(stamp: &DateTime<Local>) -> String {
    stamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Paths written by [`log_outcome`] for a given prefix
pub fn log_paths(prefix: &str) -> [PathBuf; 3] {
    [
        PathBuf::from(format!("{}_times.log", prefix)),
        PathBuf::from(format!("{}_seek.log", prefix)),
        PathBuf::from(format!("{}_timestamps.log", prefix)),
    ]
}

/// Write latencies, seek distances and start timestamps; failures only warn.
pub fn log_outcome(prefix: &str, outcome: &ReplayOutcome) {
    let [times, seeks, stamps] = log_paths(prefix);
    let results = [
        (&times, log_times(&times, &outcome.latencies_us)),
        (&seeks, log_times(&seeks, &outcome.seek_distances)),
        (&stamps, log_timestamps(&stamps, &outcome.started_at)),
    ];

    for (path, result) in results {
        match result {
            Ok(()) => info!("Wrote samples to {:?}", path),
            Err(e) => warn!("Failed to write {:?}: {:#}", path, e),
        }
    }
}
