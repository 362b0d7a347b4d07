// src/bench.rs
//
//! Sequential read/write micro-benchmark
//!
//! The benchmark is expressed as a synthetic trace so it goes through the same
//! replay loop (and the same timing discipline) as a captured one.

use anyhow::{bail, Result};
use tracing::info;

use crate::config::BenchConfig;
use crate::data_gen::make_file_if_necessary;
use crate::error::IoReplayError;
use crate::replay::{ReplayConfig, ReplayEngine, ReplayOutcome};
use crate::storage::{FileTarget, FileTargetConfig};
use crate::types::{IoOperation, OpKind, Trace};

/// `nb_run` operations of `op_len` bytes walking the file slot by slot, wrapping at the end.
pub fn sequential_trace(kind: OpKind, nb_run: usize, op_len: u64, file_size: u64) -> Result<Trace> {
    if op_len == 0 {
        bail!("operation size must be non-zero");
    }
    let length = u32::try_from(op_len)
        .map_err(|_| anyhow::anyhow!("operation size {} exceeds {} bytes", op_len, u32::MAX))?;

    let slots = (file_size / op_len).max(1);
    Ok((0..nb_run as u64)
        .map(|i| IoOperation::new(kind, (i % slots) * op_len, length))
        .collect())
}

/// Create the data file if needed, then time `nb_run` sequential operations.
pub fn run_sequential(
    kind: OpKind,
    bench: &BenchConfig,
    target_config: &FileTargetConfig,
    replay_config: ReplayConfig,
) -> Result<ReplayOutcome, IoReplayError> {
    let trace = sequential_trace(kind, bench.nb_run, bench.op_len(), bench.data_file_size)?;
    make_file_if_necessary(&bench.data_file, bench.data_file_size)?;

    info!(
        "Sequential {} benchmark: {} x {} bytes on {:?}",
        kind,
        bench.nb_run,
        bench.op_len(),
        bench.data_file
    );
    let target = FileTarget::open(&bench.data_file, target_config)?;
    ReplayEngine::new(target, replay_config).run(&trace)
}
