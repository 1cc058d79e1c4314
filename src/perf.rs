//! Performance Metrics - iteration timing and throughput
//!
//! One iteration runs the measured operation back to back until its time
//! budget is spent. The clock is read once per batch, and the batch grows
//! while it stays short compared to the budget, so cheap operations are not
//! dominated by timer overhead and slow ones do not overshoot the budget by
//! much.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Largest batch run between two clock reads.
const MAX_BATCH: u64 = 1 << 16;

/// Batches shorter than `budget / BATCH_FRACTION` double in size.
const BATCH_FRACTION: u32 = 64;

/// Operation count and wall time of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSample {
    pub ops: u64,
    pub elapsed_ns: u64,
}

impl IterationSample {
    pub fn new(ops: u64, elapsed: Duration) -> Self {
        Self {
            ops,
            elapsed_ns: elapsed.as_nanos() as u64,
        }
    }

    pub fn ops_per_sec(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        self.ops as f64 * 1e9 / self.elapsed_ns as f64
    }

    pub fn ns_per_op(&self) -> Option<f64> {
        if self.ops == 0 {
            return None;
        }
        Some(self.elapsed_ns as f64 / self.ops as f64)
    }
}

/// Runs `op` repeatedly for at least `budget` and returns the sample.
///
/// The first error from `op` ends the iteration and is returned.
pub fn measure_for<E>(
    budget: Duration,
    mut op: impl FnMut() -> Result<(), E>,
) -> Result<IterationSample, E> {
    let start = Instant::now();
    let mut last = start;
    let mut batch = 1u64;
    let mut ops = 0u64;
    loop {
        for _ in 0..batch {
            op()?;
        }
        ops += batch;
        let now = Instant::now();
        let elapsed = now - start;
        if elapsed >= budget {
            return Ok(IterationSample::new(ops, elapsed));
        }
        if (now - last) * BATCH_FRACTION < budget && batch < MAX_BATCH {
            batch *= 2;
        }
        last = now;
    }
}

/// Aggregate of the measured iterations of one or more forks.
#[derive(Debug, Default, Clone)]
pub struct Throughput {
    samples: Vec<IterationSample>,
}

impl Throughput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, samples: &[IterationSample]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the per-iteration rates.
    pub fn mean_ops_per_sec(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(IterationSample::ops_per_sec).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn min_ops_per_sec(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(IterationSample::ops_per_sec)
            .min_by(f64::total_cmp)
    }

    pub fn max_ops_per_sec(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(IterationSample::ops_per_sec)
            .max_by(f64::total_cmp)
    }
}
