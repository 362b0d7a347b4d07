// src/constants.rs
//
// Centralized constants for ioreplay to avoid hardcoded values throughout the codebase

/// Sector size used for alignment filtering, buffer alignment and size suffixes (512 bytes)
pub const BLOCK_SIZE: u64 = 512;

/// Upper bound (exclusive) on descriptor numbers tracked by the trace parser
pub const DEFAULT_MAX_DESCRIPTORS: i64 = 4096;

/// Byte used to fill the replay buffer before writes
pub const DEFAULT_FILL_BYTE: u8 = b'B';

/// Host control file used to purge the page cache (Linux)
pub const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";

/// Directive written to the drop-caches control file (page cache + dentries + inodes)
pub const DROP_CACHES_DIRECTIVE: &[u8] = b"3";

/// z-value of the two-sided 95% normal confidence interval
pub const Z_95: f64 = 1.96;

/// Chunk size used when filling the backing data file (4 MiB)
pub const DATA_GEN_CHUNK_SIZE: usize = 1 << 22;

/// Number of bins in the normalized-offset frequency histogram
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

// ============================================================================
// CLI defaults
// ============================================================================

/// Default number of operations for the sequential benchmark modes
pub const DEFAULT_NB_RUN: usize = 100;

/// Default number of blocks per benchmark operation
pub const DEFAULT_NB_BLOC: usize = 1;

/// Default benchmark block size (1 MiB)
pub const DEFAULT_SZ_BLOC: u64 = 1 << 20;

/// Default size of the backing data file (256 MiB)
pub const DEFAULT_DATA_FILE_SIZE: u64 = 256 << 20;

/// Default backing data file for the sequential benchmark modes
pub const DEFAULT_DATA_FILE: &str = "/tmp/iortest.file";

/// Header lines written in front of every filtered trace
pub const TRACE_HEADER: &str = "op_kind offset length";
pub const TRACE_HEADER_RULE: &str = "--------------------------------------";
