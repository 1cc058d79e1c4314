//! Harness error types
//!
//! Every failure aborts the trial that hit it; nothing here is retried.
//! A correctness mismatch is only an error under `MismatchPolicy::FailFast`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bench::fixture::FixtureState;
use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum HarnessError {
    // === Artifact exchange ===
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Artifact {name}: token {index} is not a 32-bit integer: {token:?}")]
    Parse {
        name: String,
        index: usize,
        token: String,
    },

    #[error("Artifact {name} holds {found} words, expected {expected} (written by another parameter?)")]
    StaleArtifact {
        name: String,
        expected: usize,
        found: usize,
    },

    // === Fixture lifecycle ===
    #[error("Fixture cannot {action} from state {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: FixtureState,
    },

    #[error("Decompression mismatch in {cell}: {detail}")]
    Mismatch { cell: String, detail: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    // === Parameters ===
    #[error("Bit width {0} is outside 1..=31")]
    InvalidBitWidth(u8),

    #[error("Unknown {kind}: {token:?}")]
    UnknownToken { kind: &'static str, token: String },

    #[error("Cell {0} needs a bit width")]
    MissingBitWidth(String),

    // === Matrix ===
    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Fork for {cell} failed: {detail}")]
    Fork { cell: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HarnessError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for a load that failed because the artifact was never written.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HarnessError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
