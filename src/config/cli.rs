//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Tokenization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SplitMode {
    /// Split on the space character only
    Space,
    /// Split on any whitespace
    Whitespace,
}

/// wordscan - Concurrent prefix-word scanner
#[derive(Parser, Debug)]
#[command(name = "wordscan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Number of worker threads (also the task and result channel capacity)
    #[arg(value_name = "WORKER_COUNT")]
    pub worker_count: Option<usize>,

    /// Literal, case-sensitive word prefix to look for
    #[arg(value_name = "PATTERN", allow_hyphen_values = true)]
    pub pattern: Option<String>,

    /// Input file; every line (or 254-byte chunk of a line) is one task
    #[arg(value_name = "SOURCE_FILE")]
    pub source_file: Option<PathBuf>,

    /// TOML configuration file (positional arguments and options override it)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Number of counting service threads
    #[arg(long)]
    pub counters: Option<usize>,

    /// Pause after each task (e.g., 500ms, 1s, 250us)
    #[arg(long)]
    pub think_time: Option<String>,

    /// Tokenization mode
    #[arg(long, value_enum)]
    pub split: Option<SplitMode>,

    /// Write a JSON report to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Debug logging, including one line per matched word
    #[arg(long, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Cli {
    /// Validate CLI arguments
    ///
    /// Without `--config` all three positional arguments are required.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.config.is_none() {
            if self.worker_count.is_none() {
                anyhow::bail!("missing <WORKER_COUNT> (or pass --config)");
            }
            if self.pattern.is_none() {
                anyhow::bail!("missing <PATTERN> (or pass --config)");
            }
            if self.source_file.is_none() {
                anyhow::bail!("missing <SOURCE_FILE> (or pass --config)");
            }
        }

        if self.worker_count == Some(0) {
            anyhow::bail!("worker count must be at least 1");
        }

        if self.counters == Some(0) {
            anyhow::bail!("counters must be at least 1");
        }

        Ok(())
    }
}
