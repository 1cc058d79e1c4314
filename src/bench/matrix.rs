//! Benchmark matrix and fork driver
//!
//! The matrix is the cross product of family, variant, parameter and phase,
//! ordered so that each decompression cell directly follows the compression
//! cell that produced its artifact:
//!
//! ```text
//! bitpackingbench/default/bw=1/compress
//! bitpackingbench/default/bw=1/decompress
//! bitpackingbench/default/bw=2/compress
//! ...
//! intcompressionbench/vector/decompress
//! ```
//!
//! Every cell runs `warmup_forks + forks` trials through a [`ForkLauncher`].
//! Reports of warmup forks are discarded.

use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactStore;
use super::fixture::{self, Fixture, FixtureVisitor, Workload};
use super::oracle::{CorrectnessOracle, Verdict};
use crate::config::BenchConfig;
use crate::core_types::{BitWidth, Family, Phase, Variant};
use crate::error::{HarnessError, Result};
use crate::perf::{self, IterationSample, Throughput};

/// Revision of the harness that produced a report.
pub const GIT_HASH: &str = env!("GIT_HASH");

// ============================================================
// Cells
// ============================================================

/// One point of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub family: Family,
    pub variant: Variant,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<BitWidth>,
}

impl Cell {
    /// Bit-packing cells require a bit width, frame-of-reference cells take
    /// none.
    pub fn new(
        family: Family,
        variant: Variant,
        phase: Phase,
        bit_width: Option<BitWidth>,
    ) -> Result<Self> {
        let cell = Self {
            family,
            variant,
            phase,
            bit_width,
        };
        match (family.takes_bit_width(), bit_width) {
            (true, None) => Err(HarnessError::MissingBitWidth(cell.to_string())),
            (false, Some(bw)) => Err(HarnessError::Config(format!(
                "{} takes no bit width, got {}",
                family, bw
            ))),
            _ => Ok(cell),
        }
    }

    pub fn require_bit_width(&self) -> Result<BitWidth> {
        self.bit_width
            .ok_or_else(|| HarnessError::MissingBitWidth(self.to_string()))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family, self.variant)?;
        if let Some(bw) = self.bit_width {
            write!(f, "/bw={}", bw)?;
        }
        write!(f, "/{}", self.phase)
    }
}

/// Builds the ordered cell list: family, variant, parameter, then phase.
pub fn schedule(families: &[Family], variants: &[Variant], bit_widths: &[BitWidth]) -> Vec<Cell> {
    let mut cells = Vec::new();
    for &family in families {
        let params: Vec<Option<BitWidth>> = if family.takes_bit_width() {
            bit_widths.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };
        for &variant in variants {
            for &bit_width in &params {
                for phase in [Phase::Compress, Phase::Decompress] {
                    cells.push(Cell {
                        family,
                        variant,
                        phase,
                        bit_width,
                    });
                }
            }
        }
    }
    cells
}

/// Checks that every decompression cell reads an artifact written by a
/// compression cell with the same parameter.
///
/// Artifact names carry no parameter, so the most recent producer for a
/// (family, variant) is what a consumer will load.
pub fn validate_schedule(cells: &[Cell]) -> Result<()> {
    let mut producers: HashMap<(Family, Variant), Option<BitWidth>> = HashMap::new();
    for cell in cells {
        let key = (cell.family, cell.variant);
        match cell.phase {
            Phase::Compress => {
                producers.insert(key, cell.bit_width);
            }
            Phase::Decompress => match producers.get(&key) {
                Some(written) if *written == cell.bit_width => {}
                Some(Some(written)) => {
                    return Err(HarnessError::Schedule(format!(
                        "{} would read the artifact written at bw={}",
                        cell, written
                    )));
                }
                Some(None) => {
                    return Err(HarnessError::Schedule(format!(
                        "{} would read an artifact written without a bit width",
                        cell
                    )));
                }
                None => {
                    return Err(HarnessError::Schedule(format!(
                        "{} has no preceding compress cell",
                        cell
                    )));
                }
            },
        }
    }
    Ok(())
}

// ============================================================
// Trials
// ============================================================

/// Iterations of one fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPlan {
    pub warmup_iterations: usize,
    pub measurement_iterations: usize,
    pub iteration_time: Duration,
}

impl IterationPlan {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            warmup_iterations: config.warmup_iterations,
            measurement_iterations: config.measurement_iterations,
            iteration_time: config.iteration_time(),
        }
    }

    fn iterate<W: Workload>(
        &self,
        fixture: &mut Fixture<W>,
        count: usize,
    ) -> Result<Vec<IterationSample>> {
        (0..count)
            .map(|_| perf::measure_for(self.iteration_time, || fixture.invoke()))
            .collect()
    }
}

/// Forks per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkPlan {
    pub warmup_forks: usize,
    pub forks: usize,
}

impl ForkPlan {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            warmup_forks: config.warmup_forks,
            forks: config.forks,
        }
    }

    pub fn total(&self) -> usize {
        self.warmup_forks + self.forks
    }
}

/// Result of one fork of one cell. Printed as a single JSON line by trial
/// children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialReport {
    pub cell: Cell,
    pub fork: usize,
    pub git_hash: String,
    pub started_at: DateTime<Utc>,
    pub warmup: Vec<IterationSample>,
    pub measured: Vec<IterationSample>,
    /// Present for decompression cells only.
    pub verdict: Option<Verdict>,
}

impl TrialReport {
    pub fn is_mismatch(&self) -> bool {
        matches!(self.verdict, Some(Verdict::Mismatch { .. }))
    }

    pub fn throughput(&self) -> Throughput {
        let mut t = Throughput::new();
        t.extend(&self.measured);
        t
    }
}

/// Runs one full trial of `cell`: setup, warmup and measured iterations,
/// teardown.
pub fn run_trial(
    cell: &Cell,
    fork: usize,
    seed: i64,
    plan: &IterationPlan,
    store: &mut dyn ArtifactStore,
    oracle: &CorrectnessOracle,
) -> Result<TrialReport> {
    fixture::build(
        cell,
        seed,
        TrialRunner {
            fork,
            plan,
            store,
            oracle,
        },
    )?
}

struct TrialRunner<'a> {
    fork: usize,
    plan: &'a IterationPlan,
    store: &'a mut dyn ArtifactStore,
    oracle: &'a CorrectnessOracle,
}

impl FixtureVisitor for TrialRunner<'_> {
    type Output = Result<TrialReport>;

    fn visit<W: Workload>(self, mut fixture: Fixture<W>) -> Result<TrialReport> {
        let cell = *fixture.cell();
        let started_at = Utc::now();

        fixture.setup(&*self.store)?;
        let warmup = self.plan.iterate(&mut fixture, self.plan.warmup_iterations)?;
        let measured = self
            .plan
            .iterate(&mut fixture, self.plan.measurement_iterations)?;
        let verdict = fixture.teardown(&mut *self.store, self.oracle)?;

        Ok(TrialReport {
            cell,
            fork: self.fork,
            git_hash: GIT_HASH.to_string(),
            started_at,
            warmup,
            measured,
            verdict,
        })
    }
}

// ============================================================
// Launchers
// ============================================================

/// Runs one fork of a cell and returns its report.
pub trait ForkLauncher {
    fn launch(&mut self, cell: &Cell, fork: usize) -> Result<TrialReport>;
}

/// Spawns `<exe> [global args] trial ...` per fork.
///
/// The child inherits stderr for its logs and prints its report as the last
/// line of stdout.
pub struct ProcessLauncher {
    exe: PathBuf,
    global_args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(exe: impl Into<PathBuf>, global_args: Vec<String>) -> Self {
        Self {
            exe: exe.into(),
            global_args,
        }
    }

    pub fn current(global_args: Vec<String>) -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| HarnessError::io("current_exe", e))?;
        Ok(Self::new(exe, global_args))
    }

    fn command(&self, cell: &Cell, fork: usize) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.args(&self.global_args)
            .arg("trial")
            .args(["--family", cell.family.as_str()])
            .args(["--variant", cell.variant.as_str()])
            .args(["--phase", cell.phase.as_str()])
            .arg("--fork")
            .arg(fork.to_string());
        if let Some(bw) = cell.bit_width {
            cmd.arg("--bit-width").arg(bw.to_string());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl ForkLauncher for ProcessLauncher {
    fn launch(&mut self, cell: &Cell, fork: usize) -> Result<TrialReport> {
        let fork_err = |detail: String| HarnessError::Fork {
            cell: cell.to_string(),
            detail,
        };

        let output = self
            .command(cell, fork)
            .output()
            .map_err(|e| HarnessError::io(&self.exe, e))?;
        if !output.status.success() {
            return Err(fork_err(format!("child exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| fork_err("child printed no report".to_string()))?;
        serde_json::from_str(line).map_err(|e| fork_err(format!("unreadable report: {}", e)))
    }
}

/// Runs every fork in the calling process against one store.
pub struct InProcessLauncher<S> {
    store: S,
    seed: i64,
    plan: IterationPlan,
    oracle: CorrectnessOracle,
}

impl<S: ArtifactStore> InProcessLauncher<S> {
    pub fn new(store: S, seed: i64, plan: IterationPlan, oracle: CorrectnessOracle) -> Self {
        Self {
            store,
            seed,
            plan,
            oracle,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: ArtifactStore> ForkLauncher for InProcessLauncher<S> {
    fn launch(&mut self, cell: &Cell, fork: usize) -> Result<TrialReport> {
        run_trial(cell, fork, self.seed, &self.plan, &mut self.store, &self.oracle)
    }
}

// ============================================================
// Matrix
// ============================================================

#[derive(Debug, Clone)]
pub struct BenchmarkMatrix {
    cells: Vec<Cell>,
    forks: ForkPlan,
}

impl BenchmarkMatrix {
    pub fn new(cells: Vec<Cell>, forks: ForkPlan) -> Result<Self> {
        validate_schedule(&cells)?;
        Ok(Self { cells, forks })
    }

    pub fn from_config(config: &BenchConfig) -> Result<Self> {
        let cells = schedule(&config.families, &config.variants, &config.bit_widths);
        Self::new(cells, ForkPlan::from_config(config))
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn forks(&self) -> ForkPlan {
        self.forks
    }

    /// Runs every cell in schedule order. Stops at the first failed fork.
    pub fn run<L: ForkLauncher + ?Sized>(&self, launcher: &mut L) -> Result<MatrixSummary> {
        let mut summary = MatrixSummary::default();
        tracing::info!(
            cells = self.cells.len(),
            warmup_forks = self.forks.warmup_forks,
            forks = self.forks.forks,
            "matrix started"
        );

        for cell in &self.cells {
            for fork in 0..self.forks.total() {
                let report = launcher.launch(cell, fork)?;
                if fork < self.forks.warmup_forks {
                    tracing::debug!(cell = %cell, fork, "warmup fork discarded");
                    summary.discarded += 1;
                    continue;
                }
                tracing::info!(
                    cell = %cell,
                    fork,
                    ops_per_sec = report.throughput().mean_ops_per_sec().unwrap_or(0.0),
                    verdict = ?report.verdict,
                    "fork complete"
                );
                if report.is_mismatch() {
                    summary.mismatches += 1;
                }
                summary.reports.push(report);
            }
        }

        tracing::info!(
            reports = summary.reports.len(),
            mismatches = summary.mismatches,
            "matrix finished"
        );
        Ok(summary)
    }
}

/// Retained reports of a matrix run.
#[derive(Debug, Default, Clone)]
pub struct MatrixSummary {
    pub reports: Vec<TrialReport>,
    pub discarded: usize,
    pub mismatches: usize,
}

impl MatrixSummary {
    pub fn all_match(&self) -> bool {
        self.mismatches == 0
    }

    /// Measured iterations of every retained fork of `cell`.
    pub fn throughput(&self, cell: &Cell) -> Throughput {
        let mut t = Throughput::new();
        for report in self.reports.iter().filter(|r| r.cell == *cell) {
            t.extend(&report.measured);
        }
        t
    }
}

/// Appends `reports` to `path` as JSON lines.
pub fn append_results(path: &Path, reports: &[TrialReport]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| HarnessError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for report in reports {
        serde_json::to_writer(&mut writer, report)
            .map_err(|e| HarnessError::io(path, io::Error::from(e)))?;
        writer.write_all(b"\n").map_err(|e| HarnessError::io(path, e))?;
    }
    writer.flush().map_err(|e| HarnessError::io(path, e))
}
