//! intcodec_bench - driver binary
//!
//! ```text
//! intcodec_bench [-e ENV | --config PATH] matrix
//!     └── per cell, per fork: intcodec_bench ... trial --family F --variant V
//!                                                   --phase P [--bit-width N] --fork K
//!                              └── stdout: one JSON TrialReport
//! ```
//!
//! Exit status: 0 when every verdict matched, 3 when the matrix finished with
//! mismatches, 1 on any failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use intcodec_bench::bench::matrix::{self, GIT_HASH};
use intcodec_bench::bench::{
    BenchmarkMatrix, Cell, CorrectnessOracle, FileArtifactStore, InProcessLauncher,
    IterationPlan, MatrixSummary, ProcessLauncher,
};
use intcodec_bench::config::AppConfig;
use intcodec_bench::logging;
use intcodec_bench::{BitWidth, Family, Phase, Variant};

/// Exit status of a matrix that completed with mismatches.
const EXIT_MISMATCH: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "intcodec_bench", version, about = "Integer codec benchmark harness")]
struct Args {
    /// Environment name, selects config/<env>.yaml
    #[arg(short, long, default_value = "dev", global = true)]
    env: String,

    /// Explicit config file, overrides --env
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every cell of the configured matrix
    Matrix {
        /// Run forks inside this process instead of spawning children
        #[arg(long)]
        in_process: bool,
    },
    /// Run one fork of one cell and print its report
    Trial {
        #[arg(long)]
        family: Family,
        #[arg(long)]
        variant: Variant,
        #[arg(long)]
        phase: Phase,
        #[arg(long)]
        bit_width: Option<u8>,
        #[arg(long, default_value_t = 0)]
        fork: usize,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let Args {
        env,
        config,
        command,
    } = args;

    let app_config = match &config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load(&env)
            .with_context(|| format!("Failed to load config for env '{}'", env))?,
    };
    let _log_guard = logging::init_logging(&app_config);

    // Children must read the same configuration as the parent
    let forwarded = match config {
        Some(path) => vec!["--config".to_string(), path.display().to_string()],
        None => vec!["--env".to_string(), env],
    };

    match command {
        Command::Matrix { in_process } => run_matrix(&app_config, forwarded, in_process),
        Command::Trial {
            family,
            variant,
            phase,
            bit_width,
            fork,
        } => {
            let bit_width = bit_width.map(BitWidth::new).transpose()?;
            let cell = Cell::new(family, variant, phase, bit_width)?;
            run_trial(&app_config, &cell, fork)
        }
    }
}

fn run_trial(app_config: &AppConfig, cell: &Cell, fork: usize) -> Result<ExitCode> {
    let bench = &app_config.bench;
    let mut store = FileArtifactStore::new(&bench.artifact_dir);
    tracing::debug!(cell = %cell, fork, dir = %store.dir().display(), "trial started");

    let report = matrix::run_trial(
        cell,
        fork,
        bench.seed,
        &IterationPlan::from_config(bench),
        &mut store,
        &CorrectnessOracle::new(bench.mismatch_policy),
    )
    .with_context(|| format!("Trial {} fork {} failed", cell, fork))?;

    println!("{}", serde_json::to_string(&report)?);
    Ok(ExitCode::SUCCESS)
}

fn run_matrix(app_config: &AppConfig, forwarded: Vec<String>, in_process: bool) -> Result<ExitCode> {
    let bench = &app_config.bench;
    let matrix = BenchmarkMatrix::from_config(bench)?;
    let forks = matrix.forks();

    println!(
        "=== intcodec_bench {}: {} cells, {} warmup + {} measured forks ===",
        GIT_HASH,
        matrix.cells().len(),
        forks.warmup_forks,
        forks.forks
    );

    let summary = if in_process {
        let mut launcher = InProcessLauncher::new(
            FileArtifactStore::new(&bench.artifact_dir),
            bench.seed,
            IterationPlan::from_config(bench),
            CorrectnessOracle::new(bench.mismatch_policy),
        );
        matrix.run(&mut launcher)?
    } else {
        let mut launcher = ProcessLauncher::current(forwarded)?;
        matrix.run(&mut launcher)?
    };

    print_summary(&matrix, &summary);

    if let Some(path) = &bench.results_file {
        matrix::append_results(path, &summary.reports)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        println!("Results appended to {}", path.display());
    }

    if summary.all_match() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} decompression mismatches", summary.mismatches);
        Ok(ExitCode::from(EXIT_MISMATCH))
    }
}

fn print_summary(matrix: &BenchmarkMatrix, summary: &MatrixSummary) {
    println!(
        "{:<44} {:>16} {:>16} {:>16}  verdict",
        "cell", "ops/s (mean)", "ops/s (min)", "ops/s (max)"
    );
    for cell in matrix.cells() {
        let throughput = summary.throughput(cell);
        let verdict = match cell.phase {
            Phase::Compress => "-",
            Phase::Decompress => {
                let mismatched = summary
                    .reports
                    .iter()
                    .any(|r| r.cell == *cell && r.is_mismatch());
                if mismatched { "MISMATCH" } else { "ok" }
            }
        };
        println!(
            "{:<44} {:>16.0} {:>16.0} {:>16.0}  {}",
            cell.to_string(),
            throughput.mean_ops_per_sec().unwrap_or(0.0),
            throughput.min_ops_per_sec().unwrap_or(0.0),
            throughput.max_ops_per_sec().unwrap_or(0.0),
            verdict
        );
    }
}
