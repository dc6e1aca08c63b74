//! Lab configuration support
//!
//! Loads configuration from `ngramlab.toml` or `.ngramlabrc.json` in the
//! given directory. Every key is optional; missing keys keep their defaults
//! and command-line flags override whatever the file says.
//!
//! # Configuration Format
//!
//! ```toml
//! # ngramlab.toml
//!
//! [ingest]
//! cache_limit = 1000000          # pending n-grams per order before a flush
//! max_token_length = 20
//! total_token_policy = "running" # or "last-batch"
//!
//! [evaluate]
//! max_sentences = 1000
//! min_sentences = 50
//! factors = [10, 100, 1000, 10000, 100000, 1000000, 10000000]
//! min_precision = 0.95
//! min_recall = 0.10
//! case_sensitive = false
//! workers = 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Factors evaluated when none are configured.
pub const DEFAULT_EVAL_FACTORS: [u64; 7] = [
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
];

/// What the unigram store's total token count means after a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TotalTokenPolicy {
    /// Previous total plus the unigram sum of the flushed batch
    #[default]
    Running,
    /// Unigram sum of the flushed batch only (overwrites the previous value)
    LastBatch,
}

impl std::str::FromStr for TotalTokenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "last-batch" => Ok(Self::LastBatch),
            other => Err(format!(
                "unknown total token policy '{}', expected 'running' or 'last-batch'",
                other
            )),
        }
    }
}

/// `[ingest]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Pending entries per order before all batches are flushed
    pub cache_limit: usize,
    /// Tokens longer than this are excluded from every n-gram
    pub max_token_length: usize,
    pub total_token_policy: TotalTokenPolicy,
    /// Log progress every this many input lines
    pub progress_every: u64,
    /// Lines buffered between the reader thread and the counter
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_limit: 1_000_000,
            max_token_length: crate::ngram::DEFAULT_MAX_TOKEN_LENGTH,
            total_token_policy: TotalTokenPolicy::default(),
            progress_every: 50_000,
            channel_capacity: 4_096,
        }
    }
}

/// `[evaluate]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Upper bound of example sentences loaded per word
    pub max_sentences: usize,
    /// A pair is skipped if either word has this many examples or fewer
    pub min_sentences: usize,
    pub factors: Vec<u64>,
    pub min_precision: f64,
    pub min_recall: f64,
    pub case_sensitive: bool,
    /// Pairs evaluated in parallel (1 = sequential)
    pub workers: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_sentences: 1_000,
            min_sentences: 50,
            factors: DEFAULT_EVAL_FACTORS.to_vec(),
            min_precision: 0.95,
            min_recall: 0.10,
            case_sensitive: false,
            workers: 1,
        }
    }
}

impl EvalConfig {
    /// Sorted, de-duplicated factors; falls back to the defaults if empty.
    pub fn normalized_factors(&self) -> Vec<u64> {
        let mut factors = if self.factors.is_empty() {
            DEFAULT_EVAL_FACTORS.to_vec()
        } else {
            self.factors.clone()
        };
        factors.sort_unstable();
        factors.dedup();
        factors
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub ingest: IngestConfig,
    pub evaluate: EvalConfig,
}

/// Load configuration from `dir`, falling back to defaults.
///
/// A file that exists but does not parse is reported and ignored rather
/// than aborting the run.
pub fn load_config(dir: &Path) -> LabConfig {
    // Try TOML first (preferred format)
    let toml_path = dir.join("ngramlab.toml");
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = dir.join(".ngramlabrc.json");
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No config file found, using defaults");
    LabConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<LabConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: LabConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<LabConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: LabConfig = serde_json::from_str(&content)?;
    Ok(config)
}
