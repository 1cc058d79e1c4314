//! Benchmark Harness Module
//!
//! Fork-isolated throughput trials for the integer codecs, with a
//! correctness check after every decompression trial.
//!
//! # Components
//!
//! - [`java_random`] - Java-compatible LCG PRNG
//! - [`data_gen`] - Deterministic input blocks
//! - [`artifact`] - Artifact exchange between trials
//! - [`fixture`] - Per-trial state and lifecycle
//! - [`oracle`] - Post-trial correctness verdict
//! - [`matrix`] - Cell schedule, trial runner and fork launchers

pub mod artifact;
pub mod data_gen;
pub mod fixture;
pub mod java_random;
pub mod matrix;
pub mod oracle;

pub use artifact::{ArtifactName, ArtifactStore, FileArtifactStore, MemoryArtifactStore};
pub use fixture::{Fixture, FixtureState, FixtureVisitor, Workload};
pub use matrix::{
    BenchmarkMatrix, Cell, ForkLauncher, ForkPlan, InProcessLauncher, IterationPlan,
    MatrixSummary, ProcessLauncher, TrialReport, run_trial,
};
pub use oracle::{CorrectnessOracle, MismatchPolicy, Verdict};
