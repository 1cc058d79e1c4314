//! Artifact exchange between compression and decompression trials
//!
//! The two halves of a round trip run in different processes, so the only
//! thing they share is a named artifact on disk. The format is plain text:
//! every value in decimal followed by a comma, no newline.
//!
//! ```text
//! [7, -1, 2147483647]  ->  "7,-1,2147483647,"
//! ```
//!
//! Decoding accepts the input with or without the single terminal comma. Any
//! other empty token is a parse error, and an empty file is the empty
//! sequence.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core_types::{Family, Stage, Variant};
use crate::error::{HarnessError, Result};

// ============================================================
// Names
// ============================================================

/// Identity of a persisted artifact: `{family}.{variant}.{stage}.data`.
///
/// The bit width is deliberately not part of the name; the matrix schedule
/// makes each decompression trial run right after the compression trial
/// that produced its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    pub family: Family,
    pub variant: Variant,
    pub stage: Stage,
}

impl ArtifactName {
    pub fn new(family: Family, variant: Variant, stage: Stage) -> Self {
        Self {
            family,
            variant,
            stage,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}.{}.data", self.family, self.variant, self.stage)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.data", self.family, self.variant, self.stage)
    }
}

// ============================================================
// Text encoding
// ============================================================

/// Writes `seq` in artifact format.
pub fn write_sequence<W: Write>(mut writer: W, seq: &[i32]) -> io::Result<()> {
    for v in seq {
        write!(writer, "{},", v)?;
    }
    writer.flush()
}

pub fn encode(seq: &[i32]) -> String {
    let mut buf = Vec::with_capacity(seq.len() * 4);
    // writing into a Vec cannot fail
    let _ = write_sequence(&mut buf, seq);
    String::from_utf8(buf).unwrap_or_default()
}

/// Parses artifact text. `name` only labels errors.
pub fn decode(name: &str, text: &str) -> Result<Vec<i32>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let body = text.strip_suffix(',').unwrap_or(text);
    let mut seq = Vec::with_capacity(text.len() / 2);
    for (index, token) in body.split(',').enumerate() {
        let value = token.parse::<i32>().map_err(|_| HarnessError::Parse {
            name: name.to_string(),
            index,
            token: token.to_string(),
        })?;
        seq.push(value);
    }
    Ok(seq)
}

/// Like [`decode`], for raw file contents. Bytes that are not UTF-8 fail
/// the token that contains them.
pub fn decode_bytes(name: &str, bytes: &[u8]) -> Result<Vec<i32>> {
    match std::str::from_utf8(bytes) {
        Ok(text) => decode(name, text),
        Err(e) => {
            let bad = e.valid_up_to();
            let start = bytes[..bad]
                .iter()
                .rposition(|&b| b == b',')
                .map_or(0, |i| i + 1);
            let end = bytes[bad..]
                .iter()
                .position(|&b| b == b',')
                .map_or(bytes.len(), |i| bad + i);
            Err(HarnessError::Parse {
                name: name.to_string(),
                index: bytes[..start].iter().filter(|&&b| b == b',').count(),
                token: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
            })
        }
    }
}

// ============================================================
// Stores
// ============================================================

/// Durable handoff of integer sequences between trials.
pub trait ArtifactStore {
    /// Replaces the artifact `name` with `seq`.
    fn store(&mut self, name: &ArtifactName, seq: &[i32]) -> Result<()>;

    /// Reads back exactly what the last `store` of `name` wrote.
    ///
    /// A missing artifact is an `Io` error of kind `NotFound`, never an
    /// empty sequence.
    fn load(&self, name: &ArtifactName) -> Result<Vec<i32>>;
}

/// Artifacts as files in one directory.
///
/// Writes go to a temporary sibling that is synced and renamed over the
/// final name, so a reader sees either the previous artifact or the whole
/// new one.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &ArtifactName) -> PathBuf {
        self.dir.join(name.file_name())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn store(&mut self, name: &ArtifactName, seq: &[i32]) -> Result<()> {
        let path = self.path(name);
        let tmp = self
            .dir
            .join(format!(".{}.tmp-{}", name.file_name(), std::process::id()));

        fs::create_dir_all(&self.dir).map_err(|e| HarnessError::io(&self.dir, e))?;
        {
            let file = File::create(&tmp).map_err(|e| HarnessError::io(&tmp, e))?;
            let mut writer = BufWriter::new(file);
            write_sequence(&mut writer, seq).map_err(|e| HarnessError::io(&tmp, e))?;
            let file = writer
                .into_inner()
                .map_err(|e| HarnessError::io(&tmp, e.into_error()))?;
            file.sync_all().map_err(|e| HarnessError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| HarnessError::io(&path, e))?;

        tracing::debug!(artifact = %name, len = seq.len(), path = %path.display(), "artifact stored");
        Ok(())
    }

    fn load(&self, name: &ArtifactName) -> Result<Vec<i32>> {
        let path = self.path(name);
        let bytes = fs::read(&path).map_err(|e| HarnessError::io(&path, e))?;
        let seq = decode_bytes(&name.file_name(), &bytes)?;
        tracing::debug!(artifact = %name, len = seq.len(), "artifact loaded");
        Ok(seq)
    }
}

/// In-process handoff for single-process drivers and tests.
///
/// Keeps the encoded text rather than the values, so it goes through the
/// same encoding as the file store.
#[derive(Debug, Default, Clone)]
pub struct MemoryArtifactStore {
    entries: HashMap<ArtifactName, String>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &ArtifactName) -> bool {
        self.entries.contains_key(name)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn store(&mut self, name: &ArtifactName, seq: &[i32]) -> Result<()> {
        self.entries.insert(*name, encode(seq));
        Ok(())
    }

    fn load(&self, name: &ArtifactName) -> Result<Vec<i32>> {
        let text = self.entries.get(name).ok_or_else(|| {
            HarnessError::io(
                name.file_name(),
                io::Error::new(io::ErrorKind::NotFound, "artifact was never stored"),
            )
        })?;
        decode(&name.file_name(), text)
    }
}
