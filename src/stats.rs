// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Latency statistics
//!
//! Quartiles are read straight out of a sorted copy at indices `n/4`, `n/2`
//! and `3n/4` (no interpolation). The confidence half-width always uses the
//! normal z-value, whatever the sample size.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::Z_95;

/// Summary of one sample set; all zero when the set is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayStats {
    pub total_ops: usize,
    pub total_bytes: u64,
    pub mean: f64,
    pub stdev: f64,
    pub min: u64,
    pub max: u64,
    pub q1: u64,
    pub median: u64,
    pub q3: u64,
    /// Half-width of the 95% confidence interval of the mean
    pub ci95: f64,
    pub total_duration_s: f64,
    pub iops: f64,
    pub throughput_mbs: f64,
}

impl ReplayStats {
    /// Compute the summary of `samples`.
    ///
    /// `span` is the wall-clock duration of the run; when it is `None` or zero
    /// the duration, IOPS and throughput fields stay at zero.
    pub fn compute(samples: &[u64], total_bytes: u64, span: Option<Duration>) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self::default();
        }

        let mut sum: u128 = 0;
        let mut sum_sq = 0.0f64;
        let mut min = samples[0];
        let mut max = samples[0];
        for &x in samples {
            sum += x as u128;
            sum_sq += (x as f64) * (x as f64);
            min = min.min(x);
            max = max.max(x);
        }

        let count = n as f64;
        let mean = sum as f64 / count;
        let variance = sum_sq / count - mean * mean;
        let stdev = variance.max(0.0).sqrt();

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let (total_duration_s, iops, throughput_mbs) = match span {
            Some(span) if !span.is_zero() => {
                let secs = span.as_secs_f64();
                (secs, count / secs, total_bytes as f64 / secs / (1024.0 * 1024.0))
            }
            _ => (0.0, 0.0, 0.0),
        };

        Self {
            total_ops: n,
            total_bytes,
            mean,
            stdev,
            min,
            max,
            q1: sorted[n / 4],
            median: sorted[n / 2],
            q3: sorted[3 * n / 4],
            ci95: Z_95 * stdev / count.sqrt(),
            total_duration_s,
            iops,
            throughput_mbs,
        }
    }

    /// Summary without throughput figures
    pub fn from_samples(samples: &[u64]) -> Self {
        Self::compute(samples, 0, None)
    }
}
