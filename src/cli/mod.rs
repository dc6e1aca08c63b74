//! CLI command definitions and handlers

mod auto;
mod evaluate;
mod ingest;
mod prob;
mod stats;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ngramlab::config::{load_config, LabConfig, TotalTokenPolicy};
use ngramlab::tokenize::{tokenizers_for, SimpleSentenceTokenizer, SimpleWordTokenizer};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a factor, allowing `_` separators (`1_000_000`)
fn parse_factor(s: &str) -> Result<u64, String> {
    let n: u64 = s
        .replace('_', "")
        .parse()
        .map_err(|_| format!("'{}' is not a valid factor", s))?;
    if n == 0 {
        Err("factor must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// ngramlab - n-gram statistics for word-confusion detection
#[derive(Parser, Debug)]
#[command(name = "ngramlab")]
#[command(
    version,
    about = "Build 1/2/3-gram frequency indexes from text and evaluate word-confusion rules against them",
    after_help = "\
Examples:
  ngramlab ingest en corpus/ ngrams/                 Count n-grams of every file in corpus/
  ngramlab ingest en counts.tsv ngrams/ --counts     Import pre-aggregated counts
  ngramlab evaluate there their ngrams/ examples/    Precision/recall per factor
  ngramlab auto candidates.txt ngrams/ examples/     Evaluate every candidate pair
  ngramlab prob ngrams/ over there                   P(there | over)
  ngramlab stats ngrams/                             Records per order

Settings are read from ngramlab.toml (or .ngramlabrc.json) in the working directory."
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of pairs evaluated in parallel (1-64)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Directory holding ngramlab.toml / .ngramlabrc.json
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count n-grams of a corpus into an index directory
    #[command(after_help = "\
Examples:
  ngramlab ingest en wiki.txt ngrams/            Single text file
  ngramlab ingest en corpus/ ngrams/ 500000      Directory, flush every 500k entries
  ngramlab ingest en counts.tsv ngrams/          `ngram<TAB>count` lines (.tsv is detected)")]
    Ingest {
        /// Language code of the corpus (en, de, pt-BR, ...)
        language: String,

        /// Text file, directory of text files, or count file
        input: PathBuf,

        /// Index directory; 1grams/, 2grams/ and 3grams/ are created inside
        output_dir: PathBuf,

        /// Pending n-grams per order before a flush
        cache_limit: Option<usize>,

        /// Treat every input file as `ngram<TAB>count` lines
        #[arg(long)]
        counts: bool,

        /// How the total token count is maintained: running, last-batch
        #[arg(long)]
        total_token_policy: Option<TotalTokenPolicy>,

        /// Do not show a progress spinner
        #[arg(long)]
        quiet: bool,
    },

    /// Evaluate one confusion pair at each factor
    #[command(after_help = "\
Examples:
  ngramlab evaluate there their ngrams/ examples/           examples/there.txt + examples/their.txt
  ngramlab evaluate there their ngrams/ tatoeba.csv         Sentences from a Tatoeba export
  ngramlab evaluate their there ngrams/ examples/ --one-way Only 'their' written for 'there'")]
    Evaluate {
        word_a: String,

        word_b: String,

        /// Index directory created by `ingest`
        ngram_dir: PathBuf,

        /// Example sentence files or directories with <word>.txt files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Factors to evaluate (comma separated)
        #[arg(long, value_delimiter = ',', value_parser = parse_factor)]
        factors: Vec<u64>,

        /// Only evaluate word A written where word B was meant
        #[arg(long)]
        one_way: bool,

        /// Maximum example sentences per word
        #[arg(long)]
        max_sentences: Option<usize>,

        /// Match example words case-sensitively
        #[arg(long)]
        case_sensitive: bool,

        /// Language code used for tokenization
        #[arg(long, default_value = "en")]
        language: String,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Evaluate every pair of a candidate file and keep the good factors
    #[command(after_help = "\
Examples:
  ngramlab auto candidates.txt ngrams/ examples/
  ngramlab auto candidates.txt ngrams/ examples/ --known-sets confusion_sets.txt
  ngramlab auto candidates.txt ngrams/ examples/ --workers 8 --format json -o report.json

Candidate lines: `there; their`, `affect -> effect`, `to; too; two` (chain)")]
    Auto {
        /// Candidate pair file
        candidates: PathBuf,

        /// Index directory created by `ingest`
        ngram_dir: PathBuf,

        /// Example sentence files or directories with <word>.txt files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Pairs listed here are skipped as already known
        #[arg(long)]
        known_sets: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Language code used for tokenization
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Pseudo-probability of the last token given the ones before it
    Prob {
        /// Index directory created by `ingest`
        ngram_dir: PathBuf,

        /// One to three tokens
        #[arg(required = true, num_args = 1..=3)]
        tokens: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record counts per order and the total token count
    Stats {
        /// Index directory created by `ingest`
        ngram_dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config_dir);
    match cli.command {
        Commands::Ingest {
            language,
            input,
            output_dir,
            cache_limit,
            counts,
            total_token_policy,
            quiet,
        } => {
            let mut ingest_config = config.ingest;
            if let Some(limit) = cache_limit {
                ingest_config.cache_limit = limit;
            }
            if let Some(policy) = total_token_policy {
                ingest_config.total_token_policy = policy;
            }
            ingest::run(&language, &input, &output_dir, ingest_config, counts, quiet)
        }

        Commands::Evaluate {
            word_a,
            word_b,
            ngram_dir,
            inputs,
            factors,
            one_way,
            max_sentences,
            case_sensitive,
            language,
            format,
        } => {
            let eval_config = eval_overrides(config, cli.workers, factors, max_sentences, case_sensitive);
            evaluate::run(
                &word_a,
                &word_b,
                !one_way,
                &ngram_dir,
                inputs,
                &language,
                eval_config,
                &format,
            )
        }

        Commands::Auto {
            candidates,
            ngram_dir,
            inputs,
            known_sets,
            format,
            output,
            language,
        } => {
            let eval_config = eval_overrides(config, cli.workers, Vec::new(), None, false);
            auto::run(
                &candidates,
                &ngram_dir,
                inputs,
                known_sets.as_deref(),
                &language,
                eval_config,
                &format,
                output.as_deref(),
            )
        }

        Commands::Prob {
            ngram_dir,
            tokens,
            json,
        } => prob::run(&ngram_dir, &tokens, json),

        Commands::Stats { ngram_dir, json } => stats::run(&ngram_dir, json),
    }
}

/// Command-line flags win over the config file.
fn eval_overrides(
    config: LabConfig,
    workers: Option<usize>,
    factors: Vec<u64>,
    max_sentences: Option<usize>,
    case_sensitive: bool,
) -> ngramlab::config::EvalConfig {
    let mut eval = config.evaluate;
    if let Some(workers) = workers {
        eval.workers = workers;
    }
    if !factors.is_empty() {
        eval.factors = factors;
    }
    if let Some(max) = max_sentences {
        eval.max_sentences = max;
    }
    if case_sensitive {
        eval.case_sensitive = true;
    }
    eval
}

fn tokenizers(language: &str) -> Result<(SimpleSentenceTokenizer, SimpleWordTokenizer)> {
    tokenizers_for(language)
        .with_context(|| format!("Unsupported language code '{}'", language))
}

/// A token cancelled on the first Ctrl-C; a second Ctrl-C exits at once.
///
/// The signal is awaited on a small current-thread runtime so the
/// synchronous pipelines only need to poll `is_cancelled()`.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let handler = token.clone();
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Ctrl-C handling unavailable: {}", e);
                return;
            }
        };
        rt.block_on(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Interrupted, stopping after the current step (Ctrl-C again to quit)");
            handler.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });
    });
    token
}

/// Fail early with a readable message if an input is missing.
fn check_inputs(inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        if !input.exists() {
            anyhow::bail!("Input does not exist: {}", input.display());
        }
    }
    Ok(())
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}
