use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bench::oracle::MismatchPolicy;
use crate::core_types::{BitWidth, DEFAULT_SEED, Family, Variant};
use crate::error::{HarnessError, Result};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default)]
    pub use_json: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String,
    #[serde(default)]
    pub bench: BenchConfig,
}

/// Matrix shape, fork/iteration counts and artifact location.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Directory holding `{family}.{variant}.{stage}.data` artifacts.
    pub artifact_dir: PathBuf,
    pub seed: i64,
    pub families: Vec<Family>,
    pub variants: Vec<Variant>,
    pub bit_widths: Vec<BitWidth>,
    pub warmup_forks: usize,
    pub forks: usize,
    pub warmup_iterations: usize,
    pub measurement_iterations: usize,
    pub iteration_time_ms: u64,
    pub mismatch_policy: MismatchPolicy,
    /// Retained trial reports are appended here as JSON lines.
    pub results_file: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("."),
            seed: DEFAULT_SEED,
            families: Family::ALL.to_vec(),
            variants: Variant::ALL.to_vec(),
            bit_widths: BitWidth::all().collect(),
            warmup_forks: 2,
            forks: 3,
            warmup_iterations: 2,
            measurement_iterations: 4,
            iteration_time_ms: 1000,
            mismatch_policy: MismatchPolicy::Continue,
            results_file: None,
        }
    }
}

impl BenchConfig {
    pub fn iteration_time(&self) -> Duration {
        Duration::from_millis(self.iteration_time_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forks == 0 {
            return Err(HarnessError::Config("forks must be at least 1".into()));
        }
        if self.measurement_iterations == 0 {
            return Err(HarnessError::Config(
                "measurement_iterations must be at least 1".into(),
            ));
        }
        if self.iteration_time_ms == 0 {
            return Err(HarnessError::Config("iteration_time_ms must be positive".into()));
        }
        if self.families.contains(&Family::BitPacking) && self.bit_widths.is_empty() {
            return Err(HarnessError::Config(
                "bit_widths is empty but bitpackingbench is selected".into(),
            ));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_file() -> String {
    "intcodec_bench.log".to_string()
}

fn default_rotation() -> String {
    "never".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            use_json: false,
            rotation: default_rotation(),
            bench: BenchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads `config/{env}.yaml`.
    pub fn load(env: &str) -> Result<Self> {
        Self::load_from(format!("config/{}.yaml", env))
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| HarnessError::Config(format!("{}: {}", path.display(), e)))?;
        config.bench.validate()?;
        Ok(config)
    }
}
