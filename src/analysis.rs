// src/analysis.rs
//
//! Offset distribution of a trace
//!
//! Offsets are min-max normalized into `[0, 1]` and bucketed into a fixed
//! number of equal-width bins, which shows at a glance whether a captured
//! workload is sequential, clustered or spread over the whole device.

use serde::Serialize;

use crate::types::Trace;

/// Min-max normalization: `(x - min) / (max - min)`.
///
/// All zeros when every value is equal; empty input gives empty output.
pub fn normalize_offsets(offsets: &[u64]) -> Vec<f64> {
    let (Some(&min), Some(&max)) = (offsets.iter().min(), offsets.iter().max()) else {
        return Vec::new();
    };
    if min == max {
        return vec![0.0; offsets.len()];
    }

    let range = (max - min) as f64;
    offsets.iter().map(|&x| (x - min) as f64 / range).collect()
}

/// Equal-width histogram of values in `[0, 1]`; the last bin is closed.
pub fn histogram(values: &[f64], bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }
    for &v in values {
        let idx = ((v * bins as f64) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

/// Normalized-offset summary of a trace
#[derive(Debug, Clone, Default, Serialize)]
pub struct OffsetDistribution {
    pub min_offset: u64,
    pub max_offset: u64,
    pub mean: f64,
    pub bins: Vec<usize>,
}

impl OffsetDistribution {
    pub fn from_trace(trace: &Trace, bins: usize) -> Self {
        let offsets: Vec<u64> = trace.iter().map(|op| op.offset).collect();
        let normalized = normalize_offsets(&offsets);
        let mean = if normalized.is_empty() {
            0.0
        } else {
            normalized.iter().sum::<f64>() / normalized.len() as f64
        };

        Self {
            min_offset: offsets.iter().copied().min().unwrap_or(0),
            max_offset: offsets.iter().copied().max().unwrap_or(0),
            mean,
            bins: histogram(&normalized, bins),
        }
    }

    /// Text rendering: one bar per bin
    pub fn render(&self) -> String {
        let mut out = format!(
            "Offsets {} .. {} (normalized mean {:.4})\n",
            self.min_offset, self.max_offset, self.mean
        );
        let n = self.bins.len();
        let peak = self.bins.iter().copied().max().unwrap_or(0).max(1);
        for (i, &count) in self.bins.iter().enumerate() {
            let lo = i as f64 / n as f64;
            let bar = "#".repeat(count * 50 / peak);
            out.push_str(&format!("  [{:.2}, {:.2}) {:>8} {}\n", lo, lo + 1.0 / n as f64, count, bar));
        }
        out
    }
}
