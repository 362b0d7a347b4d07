// src/report.rs
//
//! Human-readable and JSON rendering of replay statistics

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::replay::ReplayOutcome;
use crate::stats::ReplayStats;

const MIB: f64 = 1024.0 * 1024.0;

/// Latency and seek statistics of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub executed: usize,
    pub planned: usize,
    pub short_transfers: u64,
    pub failed_transfers: u64,
    pub aborted_at: Option<usize>,
    pub latency_us: ReplayStats,
    pub seek_bytes: ReplayStats,
}

impl RunReport {
    pub fn new(planned: usize, outcome: &ReplayOutcome) -> Self {
        Self {
            executed: outcome.executed,
            planned,
            short_transfers: outcome.short_transfers,
            failed_transfers: outcome.failed_transfers,
            aborted_at: outcome.aborted.as_ref().map(|a| a.index),
            latency_us: ReplayStats::compute(
                &outcome.latencies_us,
                outcome.requested_bytes,
                Some(outcome.elapsed),
            ),
            seek_bytes: ReplayStats::from_samples(&outcome.seek_distances),
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}

/// Full statistics block
pub fn format_stats(stats: &ReplayStats) -> String {
    const RULE: &str = "-----------------------------";
    format!(
        "\n--- Benchmark statistics ---\n\
         Operations executed  : {ops}\n\
         Data transferred     : {mb:.2} MB\n\
         Total duration       : {dur:.3} s\n\
         {RULE}\n\
         Mean rate            : {iops:.2} IOPS\n\
         Mean throughput      : {mbs:.2} MB/s\n\
         {RULE}\n\
         Latency (us)         :\n\
         \x20 Mean               : {mean:.2} us\n\
         \x20 Std deviation      : {stdev:.2} us\n\
         \x20 Min / Max          : {min} us / {max} us\n\
         \x20 Quartiles (Q1/Med/Q3): {q1} us / {median} us / {q3} us\n\
         \x20 95% CI             : ±{ci:.2} us\n\
         {RULE}\n",
        ops = stats.total_ops,
        mb = stats.total_bytes as f64 / MIB,
        dur = stats.total_duration_s,
        iops = stats.iops,
        mbs = stats.throughput_mbs,
        mean = stats.mean,
        stdev = stats.stdev,
        min = stats.min,
        max = stats.max,
        q1 = stats.q1,
        median = stats.median,
        q3 = stats.q3,
        ci = stats.ci95,
    )
}

/// One-line latency summary in milliseconds
pub fn summary_line(stats: &ReplayStats) -> String {
    format!(
        "Mean: {:.6} ms     95% CI: ±{:.6} ms     Q1: {:.6} ms     Median: {:.6} ms     Q3: {:.6} ms",
        stats.mean / 1000.0,
        stats.ci95 / 1000.0,
        stats.q1 as f64 / 1000.0,
        stats.median as f64 / 1000.0,
        stats.q3 as f64 / 1000.0
    )
}

/// One-line seek-distance summary in bytes
pub fn seek_line(stats: &ReplayStats) -> String {
    format!(
        "Seek distance: mean {:.1} B     Q1: {} B     Median: {} B     Q3: {} B     Max: {} B",
        stats.mean, stats.q1, stats.median, stats.q3, stats.max
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayAbort;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_summary_line_in_ms() {
        let stats = ReplayStats::from_samples(&[1000, 2000, 3000, 4000]);
        let line = summary_line(&stats);
        assert!(line.starts_with("Mean: 2.500000 ms"));
        assert!(line.contains("Median: 3.000000 ms"));
    }

    #[test]
    fn test_format_stats_mentions_quartiles() {
        let text = format_stats(&ReplayStats::from_samples(&[10, 20, 30, 40, 50, 60, 70, 80]));
        assert!(text.contains("30 us / 50 us / 70 us"));
        assert!(text.contains("  Min / Max          : 10 us / 80 us\n"));
        assert_eq!(text.lines().filter(|l| l.starts_with("---------")).count(), 3);
    }

    #[test]
    fn test_report_json() {
        let outcome = ReplayOutcome {
            executed: 2,
            latencies_us: vec![100, 300],
            seek_distances: vec![0, 512],
            requested_bytes: 1024,
            elapsed: Duration::from_millis(1),
            aborted: Some(ReplayAbort { index: 2, offset: 0, reason: "bad seek".into() }),
            ..Default::default()
        };
        let report = RunReport::new(3, &outcome);
        assert_eq!(report.aborted_at, Some(2));
        assert_eq!(report.latency_us.total_bytes, 1024);
        assert_eq!(report.seek_bytes.max, 512);

        let file = NamedTempFile::with_suffix(".json").unwrap();
        report.write_json(file.path()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(value["executed"], 2);
        assert_eq!(value["latency_us"]["median"], 300);
    }
}
