//! intcodec_bench - Integer Codec Benchmark Harness
//!
//! Measures scalar and vectorized integer codecs in isolated processes and
//! checks every decompression against the data that was compressed.
//!
//! # Modules
//!
//! - [`core_types`] - Block constants, bit width and cell tokens
//! - [`codec`] - Block packers, variable byte, patched frame-of-reference
//! - [`bench`] - Data generation, artifacts, fixtures, oracle and matrix
//! - [`perf`] - Iteration timing and throughput
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;
pub mod error;

pub mod bench;
pub mod codec;
pub mod config;
pub mod logging;
pub mod perf;

// Convenient re-exports at crate root
pub use bench::{
    ArtifactName, ArtifactStore, BenchmarkMatrix, Cell, CorrectnessOracle, FileArtifactStore,
    MemoryArtifactStore, MismatchPolicy, Verdict,
};
pub use codec::{BlockPacker, CodecError, IntegerCodec, Progress};
pub use config::{AppConfig, BenchConfig};
pub use core_types::{BitWidth, Family, Phase, Stage, Variant};
pub use error::{HarnessError, Result};
