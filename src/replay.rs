// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trace replay engine with per-operation timing
//!
//! Operations run strictly one after another against a [`StorageTarget`].
//! Only the read/write call itself sits inside the timed window; positioning
//! and cache purges happen outside it.

use chrono::{DateTime, Local};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::CachePolicy;
use crate::constants::{BLOCK_SIZE, DEFAULT_FILL_BYTE};
use crate::error::IoReplayError;
use crate::memory::AlignedBuf;
use crate::storage::{FileTarget, FileTargetConfig, StorageTarget};
use crate::types::Trace;

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// When to purge the page cache
    pub cache_policy: CachePolicy,

    /// Buffer alignment and minimum buffer size
    pub block_size: usize,

    /// Initial buffer contents; reads overwrite the buffer in place, so later
    /// writes send whatever the last read left there
    pub fill_byte: u8,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::default(),
            block_size: BLOCK_SIZE as usize,
            fill_byte: DEFAULT_FILL_BYTE,
        }
    }
}

/// Why the replay loop stopped before the end of the trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayAbort {
    /// Index of the operation that could not be positioned
    pub index: usize,
    pub offset: u64,
    pub reason: String,
}

/// Everything measured during one replay run
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    /// Operations actually executed
    pub executed: usize,

    /// Elapsed time of each transfer call, in microseconds
    pub latencies_us: Vec<u64>,

    /// |offset - previous offset| for each executed operation (0 for the first)
    pub seek_distances: Vec<u64>,

    /// Wall-clock time at which each transfer started
    pub started_at: Vec<DateTime<Local>>,

    /// Sum of requested lengths of executed operations
    pub requested_bytes: u64,

    /// Sum of bytes the transfer calls reported
    pub transferred_bytes: u64,

    /// Transfers that moved fewer bytes than requested
    pub short_transfers: u64,

    /// Transfers that returned an error
    pub failed_transfers: u64,

    /// Wall-clock span of the replay loop
    pub elapsed: Duration,

    pub aborted: Option<ReplayAbort>,
}

/// Sequential replay engine
///
/// Owns the target and the aligned buffer for the duration of a run.
pub struct ReplayEngine<T: StorageTarget> {
    target: T,
    config: ReplayConfig,
}

impl<T: StorageTarget> ReplayEngine<T> {
    pub fn new(target: T, config: ReplayConfig) -> Self {
        Self { target, config }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn into_target(self) -> T {
        self.target
    }

    /// Buffer sized to the largest operation (at least one block), block aligned
    fn prepare_buffer(&self, trace: &Trace) -> Result<AlignedBuf, IoReplayError> {
        let block = self.config.block_size;
        let max_len = trace.max_length().map(|len| len as usize).unwrap_or(0);
        let len = if max_len == 0 { block } else { max_len };

        let buf = AlignedBuf::filled(len, block, self.config.fill_byte)?;
        info!("I/O buffer of {} bytes prepared (align {})", buf.len(), buf.align());
        Ok(buf)
    }

    fn purge(&mut self) {
        if let Err(e) = self.target.bypass_cache() {
            warn!("Cache purge failed (continuing): {}", e);
        }
    }

    /// Execute every operation of `trace` in order.
    ///
    /// Only buffer allocation can fail; a positioning failure ends the loop
    /// early and is reported through [`ReplayOutcome::aborted`].
    pub fn run(&mut self, trace: &Trace) -> Result<ReplayOutcome, IoReplayError> {
        let mut buffer = self.prepare_buffer(trace)?;
        let mut outcome = ReplayOutcome {
            latencies_us: Vec::with_capacity(trace.len()),
            seek_distances: Vec::with_capacity(trace.len()),
            started_at: Vec::with_capacity(trace.len()),
            ..Default::default()
        };

        if self.config.cache_policy.purge_before_run() {
            self.purge();
        }

        info!("Starting replay of {} operations (cache policy: {:?})", trace.len(), self.config.cache_policy);
        let loop_start = Instant::now();
        let mut last_offset: Option<u64> = None;

        for (index, op) in trace.iter().enumerate() {
            let seek = last_offset.map_or(0, |last| op.offset.abs_diff(last));

            if let Err(e) = self.target.position(op.offset) {
                warn!("Positioning to {} failed at operation {}: {}", op.offset, index, e);
                outcome.aborted = Some(ReplayAbort { index, offset: op.offset, reason: e.to_string() });
                break;
            }

            let len = op.length as usize;
            outcome.started_at.push(Local::now());

            let t0 = Instant::now();
            let result = self.target.transfer(op.kind, &mut buffer.as_mut_slice()[..len]);
            let elapsed = t0.elapsed();

            outcome.latencies_us.push(elapsed.as_micros() as u64);
            outcome.seek_distances.push(seek);
            outcome.requested_bytes += op.length as u64;
            match result {
                Ok(n) => {
                    outcome.transferred_bytes += n as u64;
                    if n < len {
                        debug!("Short {} at {}: {} of {} bytes", op.kind, op.offset, n, len);
                        outcome.short_transfers += 1;
                    }
                }
                Err(e) => {
                    debug!("{} at {} failed: {}", op.kind, op.offset, e);
                    outcome.failed_transfers += 1;
                }
            }

            last_offset = Some(op.offset);
            outcome.executed += 1;

            if self.config.cache_policy.purge_each_op() {
                self.purge();
            }
        }

        outcome.elapsed = loop_start.elapsed();
        info!(
            "Replay finished: {} of {} operations executed in {:.3}s",
            outcome.executed,
            trace.len(),
            outcome.elapsed.as_secs_f64()
        );
        if outcome.short_transfers > 0 || outcome.failed_transfers > 0 {
            warn!(
                "{} short and {} failed transfers were timed as if complete",
                outcome.short_transfers, outcome.failed_transfers
            );
        }
        Ok(outcome)
    }
}

/// Open `path` as a [`FileTarget`] and replay `trace` against it
pub fn replay_file<P: AsRef<Path>>(
    trace: &Trace,
    path: P,
    target_config: &FileTargetConfig,
    config: ReplayConfig,
) -> Result<ReplayOutcome, IoReplayError> {
    let target = FileTarget::open(path, target_config)?;
    ReplayEngine::new(target, config).run(trace)
}
