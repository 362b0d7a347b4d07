// src/lib.rs
//
// Crate root: public modules and re-exports.

//! ioreplay: replay captured file I/O against a storage target and measure it.
//!
//! The pipeline is
//! syscall log → [`strace::TraceParser`] → [`codec`] file → [`replay::ReplayEngine`]
//! → latency samples → [`stats::ReplayStats`].
//!
//! ```no_run
//! use ioreplay::{codec, ReplayConfig, ReplayStats, FileTargetConfig, TraceParser};
//!
//! # fn main() -> anyhow::Result<()> {
//! let trace = TraceParser::new().parse_file("app.strace")?;
//! codec::save(&trace, "filtered_trace.log")?;
//!
//! let trace = codec::load("filtered_trace.log")?;
//! let outcome = ioreplay::replay_file(&trace, "/dev/sdb", &FileTargetConfig::default(), ReplayConfig::default())?;
//! let stats = ReplayStats::from_samples(&outcome.latencies_us);
//! println!("median {} us", stats.median);
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod config;
pub mod error;
pub mod types;

pub mod strace;
pub mod codec;

pub mod memory;
pub mod page_cache;
pub mod storage;
pub mod replay;
pub mod stats;

pub mod analysis;
pub mod bench;
pub mod data_gen;
pub mod report;
pub mod sample_log;

pub use config::{parse_size, BenchConfig, BenchMode, CachePolicy};
pub use error::{CacheError, IoReplayError};
pub use replay::{replay_file, ReplayAbort, ReplayConfig, ReplayEngine, ReplayOutcome};
pub use stats::ReplayStats;
pub use storage::{FileTarget, FileTargetConfig, StorageTarget};
pub use strace::{ParserConfig, TraceParser};
pub use types::{IoOperation, OpKind, Trace};
