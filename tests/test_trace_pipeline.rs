// tests/test_trace_pipeline.rs
//
// Syscall log -> filtered trace file -> replay against a real file -> statistics

use anyhow::Result;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

use ioreplay::{
    codec, replay_file, CachePolicy, FileTarget, FileTargetConfig, OpKind, ReplayConfig,
    ReplayEngine, ReplayStats, TraceParser,
};

const SAMPLE_LOG: &str = "\
[pid 100] openat(AT_FDCWD, \"/data/db\", O_RDWR) = 3</data/db>
[pid 100] read(3</data/db>, \"\\0\\0\"..., 512) = 512
[pid 100] read(3</data/db>, \"\\0\\0\"..., 512) = 512
[pid 100] read(3</data/db>, \"\\0\\0\"..., 100) = 100
[pid 100] read(3</data/db>, \"\\0\\0\"..., 512) = 512
[pid 101] lseek(3</data/db>, 4096, SEEK_SET) = 4096
[pid 101] write(3</data/db>, \"a, b, c\"..., 512) = 512
";

fn test_target() -> FileTargetConfig {
    FileTargetConfig {
        drop_caches_path: "/nonexistent/drop_caches".into(),
        ..FileTargetConfig::buffered()
    }
}

#[test]
fn test_example_log_filters_to_aligned_blocks() -> Result<()> {
    let mut log = NamedTempFile::with_suffix(".strace")?;
    writeln!(log, "[pid 1] read(3</a>, \"\"..., 512) = 512")?;
    writeln!(log, "[pid 1] read(3</a>, \"\"..., 512) = 512")?;
    log.flush()?;

    let trace = TraceParser::new().parse_file(log.path())?;

    let mut encoded = Vec::new();
    codec::encode(&trace, &mut encoded)?;
    let text = String::from_utf8(encoded)?;
    let body: Vec<&str> = text.lines().skip(2).collect();
    assert_eq!(body, vec!["0 0 512", "0 512 512"]);
    Ok(())
}

#[test]
fn test_unaligned_read_shifts_later_offsets() -> Result<()> {
    let mut parser = TraceParser::new();
    let trace = parser.parse_reader(SAMPLE_LOG.as_bytes())?;

    // The 100-byte read moves fd 3 to 1124, so the next 512-byte read is dropped.
    let ops: Vec<(OpKind, u64)> = trace.iter().map(|op| (op.kind, op.offset)).collect();
    assert_eq!(ops, vec![(OpKind::Read, 0), (OpKind::Read, 512), (OpKind::Write, 4096)]);
    assert_eq!(parser.stats().transfers, 5);
    assert_eq!(parser.stats().emitted, 3);
    Ok(())
}

#[test]
fn test_full_pipeline() -> Result<()> {
    let dir = tempdir()?;
    let log_path = dir.path().join("app.strace");
    let trace_path = dir.path().join("filtered_trace.log.zst");
    let data_path = dir.path().join("data.bin");

    std::fs::write(&log_path, SAMPLE_LOG)?;
    std::fs::write(&data_path, vec![0u8; 8192])?;

    let trace = TraceParser::new().parse_file(&log_path)?;
    codec::save(&trace, &trace_path)?;
    let loaded = codec::load(&trace_path)?;
    assert_eq!(loaded, trace);

    let config = ReplayConfig { cache_policy: CachePolicy::Never, ..Default::default() };
    let outcome = replay_file(&loaded, &data_path, &test_target(), config)?;
    assert_eq!(outcome.executed, 3);
    assert!(outcome.aborted.is_none());
    assert_eq!(outcome.seek_distances, vec![0, 512, 3584]);
    assert_eq!(outcome.failed_transfers, 0);
    assert_eq!(outcome.short_transfers, 0);

    let stats = ReplayStats::from_samples(&outcome.seek_distances);
    assert_eq!(stats.total_ops, 3);
    assert_eq!(stats.min, 0);
    assert_eq!(stats.max, 3584);

    // The buffer is reused in place: the write sends what the reads left in it
    let data = std::fs::read(&data_path)?;
    assert_eq!(data.len(), 8192);
    assert!(data[4096..4608].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn test_empty_log_gives_empty_statistics() -> Result<()> {
    let trace = TraceParser::new().parse_reader("".as_bytes())?;
    assert!(trace.is_empty());

    let data = NamedTempFile::new()?;
    let target = FileTarget::open(data.path(), &test_target())?;
    let outcome = ReplayEngine::new(target, ReplayConfig::default()).run(&trace)?;
    assert_eq!(outcome.executed, 0);
    assert_eq!(ReplayStats::from_samples(&outcome.latencies_us), ReplayStats::default());
    Ok(())
}
