//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! A run is configured either entirely from the command line or from a TOML
//! file with command-line values layered on top.
//!
//! ```toml
//! [scan]
//! pattern = "cat"
//! source = "input.txt"
//! split = "space"
//!
//! [workers]
//! count = 4
//! think_time_us = 1000000
//!
//! [counting]
//! pool_size = 1
//! ```

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::worker::SplitMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub counting: CountingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// What to scan and how
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Literal prefix to match (case-sensitive; empty matches every token)
    ///
    /// None means no pattern was given anywhere, which is not the same as
    /// an explicit empty pattern.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Input file, one task per line chunk
    #[serde(default)]
    pub source: PathBuf,
    /// Tokenization mode
    #[serde(default)]
    pub split: SplitMode,
}

impl ScanConfig {
    /// The configured pattern, empty when none was given
    pub fn pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or_default()
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads; also the capacity of the task and result channels
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Pause after each task, in microseconds
    #[serde(default)]
    pub think_time_us: Option<u64>,
}

fn default_worker_count() -> usize {
    1
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            think_time_us: None,
        }
    }
}

impl WorkerConfig {
    /// Think time as a duration; None when unset or zero
    pub fn think_time(&self) -> Option<Duration> {
        self.think_time_us
            .filter(|&us| us > 0)
            .map(Duration::from_micros)
    }
}

/// Counting service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountingConfig {
    /// Number of counting service threads
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    1
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write a JSON report to this path
    #[serde(default)]
    pub json_output: Option<PathBuf>,
    /// Only warnings and errors on the log stream
    #[serde(default)]
    pub quiet: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Debug logging, including one line per matched word
    #[serde(default)]
    pub debug: bool,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Scan: {}", self.scan)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Counting: {}", self.counting)?;
        write!(f, "  Output: {}", self.output)
    }
}

impl fmt::Display for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pattern={:?}, source={}, split={}",
            self.pattern(),
            self.source.display(),
            self.split.as_str()
        )
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "count={}", self.count)?;
        if let Some(think) = self.think_time() {
            write!(f, ", think_time={:?}", think)?;
        }
        Ok(())
    }
}

impl fmt::Display for CountingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool_size={}", self.pool_size)
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.json_output {
            Some(path) => write!(f, "json={}", path.display()),
            None => write!(f, "text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workers.count, 1);
        assert_eq!(config.counting.pool_size, 1);
        assert_eq!(config.scan.split, SplitMode::Space);
        assert!(config.workers.think_time().is_none());
        assert!(config.output.json_output.is_none());
        assert!(config.scan.pattern.is_none());
        assert_eq!(config.scan.pattern(), "");
    }

    #[test]
    fn test_think_time_conversion() {
        let mut workers = WorkerConfig::default();
        workers.think_time_us = Some(0);
        assert!(workers.think_time().is_none());

        workers.think_time_us = Some(1_500);
        assert_eq!(workers.think_time(), Some(Duration::from_micros(1_500)));
    }

    #[test]
    fn test_display() {
        let mut config = Config::default();
        config.scan.pattern = Some("cat".to_string());
        config.scan.source = PathBuf::from("input.txt");

        let text = config.to_string();
        assert!(text.contains("pattern=\"cat\""));
        assert!(text.contains("source=input.txt"));
        assert!(text.contains("pool_size=1"));
    }
}
