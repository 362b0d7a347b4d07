// src/config.rs
//
// Runtime parameters shared by the CLI and the library.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;

use crate::constants::{
    BLOCK_SIZE, DEFAULT_DATA_FILE, DEFAULT_DATA_FILE_SIZE, DEFAULT_NB_BLOC, DEFAULT_NB_RUN,
    DEFAULT_SZ_BLOC,
};

/// What the CLI does with the data file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BenchMode {
    /// Sequential reads of nb_bloc * sz_bloc bytes
    Read,
    /// Sequential writes of nb_bloc * sz_bloc bytes
    Write,
    /// Replay a filtered trace against the data file
    Replay,
    /// Offset distribution of a filtered trace (no I/O)
    Analyze,
}

/// When the replay loop purges the page cache.
///
/// `EveryOp` runs a synchronous flush + purge after each operation, so every
/// measurement starts cold. `BeforeRun` measures a warm cache after the first
/// operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CachePolicy {
    /// Never purge
    Never,
    /// Purge once before the first operation
    BeforeRun,
    /// Purge before the first operation and after every operation
    #[default]
    EveryOp,
}

impl CachePolicy {
    pub fn purge_before_run(self) -> bool {
        !matches!(self, CachePolicy::Never)
    }

    pub fn purge_each_op(self) -> bool {
        matches!(self, CachePolicy::EveryOp)
    }
}

/// Parse a byte count with an optional unit suffix.
///
/// `s` multiplies by 512, `k` by 2^10, `m` by 2^20 and `g` by 2^30 (either case).
pub fn parse_size(arg: &str) -> Result<u64> {
    let arg = arg.trim();
    let Some(last) = arg.chars().last() else {
        bail!("empty size");
    };

    let (digits, multiplier) = match last.to_ascii_lowercase() {
        's' => (&arg[..arg.len() - 1], BLOCK_SIZE),
        'k' => (&arg[..arg.len() - 1], 1 << 10),
        'm' => (&arg[..arg.len() - 1], 1 << 20),
        'g' => (&arg[..arg.len() - 1], 1 << 30),
        _ => (arg, 1),
    };

    let value: u64 = digits
        .parse()
        .with_context(|| format!("invalid size: {}", arg))?;
    value
        .checked_mul(multiplier)
        .with_context(|| format!("size overflows 64 bits: {}", arg))
}

/// Clap adapter for [`parse_size`]
pub fn parse_size_arg(arg: &str) -> std::result::Result<u64, String> {
    parse_size(arg).map_err(|e| e.to_string())
}

/// Parameters of the sequential read/write benchmark.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub nb_run: usize,
    pub nb_bloc: usize,
    pub sz_bloc: u64,
    pub data_file: PathBuf,
    pub data_file_size: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            nb_run: DEFAULT_NB_RUN,
            nb_bloc: DEFAULT_NB_BLOC,
            sz_bloc: DEFAULT_SZ_BLOC,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            data_file_size: DEFAULT_DATA_FILE_SIZE,
        }
    }
}

impl BenchConfig {
    /// Bytes moved by one benchmark operation
    pub fn op_len(&self) -> u64 {
        self.sz_bloc.saturating_mul(self.nb_bloc as u64)
    }
}
