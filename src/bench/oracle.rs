//! Post-trial correctness check
//!
//! The verdict is reported next to the throughput samples, never folded into
//! them: a decompressor that produces wrong output still has a measurable
//! speed. Whether a mismatch also fails the trial is the caller's choice via
//! [`MismatchPolicy`].

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Outcome of comparing the restored block with the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Match,
    Mismatch {
        /// First index where the sequences differ (or the shorter length).
        first_index: usize,
        expected_len: usize,
        actual_len: usize,
        /// Positions that differ within the common prefix.
        differing: usize,
    },
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

/// What a trial does when its verdict is a mismatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Emit the mismatch event and report it; the trial still succeeds.
    #[default]
    Continue,
    /// Fail the trial with [`HarnessError::Mismatch`].
    FailFast,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CorrectnessOracle {
    policy: MismatchPolicy,
}

impl CorrectnessOracle {
    pub fn new(policy: MismatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MismatchPolicy {
        self.policy
    }

    /// Element-wise comparison, no side effects.
    pub fn check(expected: &[i32], actual: &[i32]) -> Verdict {
        let common = expected.len().min(actual.len());
        let mut first = None;
        let mut differing = 0;
        for (i, (e, a)) in expected[..common].iter().zip(&actual[..common]).enumerate() {
            if e != a {
                first.get_or_insert(i);
                differing += 1;
            }
        }
        if first.is_none() && expected.len() == actual.len() {
            return Verdict::Match;
        }
        Verdict::Mismatch {
            first_index: first.unwrap_or(common),
            expected_len: expected.len(),
            actual_len: actual.len(),
            differing,
        }
    }

    /// Checks, signals a mismatch, and applies the policy.
    ///
    /// A mismatch is emitted as an `ERROR` event on the
    /// `intcodec_bench::correctness` target carrying the cell and the first
    /// differing values.
    pub fn verify(&self, cell: &str, expected: &[i32], actual: &[i32]) -> Result<Verdict> {
        let verdict = Self::check(expected, actual);
        if let Verdict::Mismatch {
            first_index,
            expected_len,
            actual_len,
            differing,
        } = verdict
        {
            tracing::error!(
                target: "intcodec_bench::correctness",
                cell,
                first_index,
                expected = ?expected.get(first_index),
                actual = ?actual.get(first_index),
                expected_len,
                actual_len,
                differing,
                policy = ?self.policy,
                "decompression mismatch"
            );
            if self.policy == MismatchPolicy::FailFast {
                return Err(HarnessError::Mismatch {
                    cell: cell.to_string(),
                    detail: format!(
                        "first difference at {} ({} differing, lengths {}/{})",
                        first_index, differing, expected_len, actual_len
                    ),
                });
            }
        } else {
            tracing::debug!(target: "intcodec_bench::correctness", cell, len = actual.len(), "round trip verified");
        }
        Ok(verdict)
    }
}
