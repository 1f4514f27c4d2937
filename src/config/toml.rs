//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    if let Some(count) = cli.worker_count {
        config.workers.count = count;
    }
    if let Some(pattern) = &cli.pattern {
        config.scan.pattern = Some(pattern.clone());
    }
    if let Some(source) = &cli.source_file {
        config.scan.source = source.clone();
    }
    if let Some(split) = cli.split {
        config.scan.split = cli_convert::convert_split_mode(split);
    }

    if let Some(counters) = cli.counters {
        config.counting.pool_size = counters;
    }
    if let Some(think) = &cli.think_time {
        let us = cli_convert::parse_time_us(think).context("Invalid think time")?;
        config.workers.think_time_us = Some(us);
    }

    if let Some(path) = &cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}

/// Build the run configuration: TOML file if given, CLI on top
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_parse_toml_basic() {
        let config = parse_toml_string(
            r#"
            [scan]
            pattern = "cat"
            source = "input.txt"
            split = "whitespace"

            [workers]
            count = 4
            think_time_us = 1000

            [counting]
            pool_size = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.pattern.as_deref(), Some("cat"));
        assert_eq!(config.scan.source, PathBuf::from("input.txt"));
        assert_eq!(config.scan.split, SplitMode::Whitespace);
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.workers.think_time(), Some(Duration::from_millis(1)));
        assert_eq!(config.counting.pool_size, 2);
    }

    #[test]
    fn test_parse_toml_defaults() {
        let config = parse_toml_string("[scan]\npattern = \"x\"\n").unwrap();
        assert_eq!(config.workers.count, 1);
        assert_eq!(config.counting.pool_size, 1);
        assert_eq!(config.scan.split, SplitMode::Space);
    }

    #[test]
    fn test_parse_toml_rejects_unknown_split() {
        assert!(parse_toml_string("[scan]\nsplit = \"comma\"\n").is_err());
    }

    #[test]
    fn test_cli_overrides_toml() {
        let base = parse_toml_string(
            r#"
            [scan]
            pattern = "dog"
            source = "a.txt"

            [workers]
            count = 8

            [counting]
            pool_size = 4
            "#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "wordscan",
            "2",
            "cat",
            "b.txt",
            "--think-time",
            "10ms",
            "--split",
            "whitespace",
        ])
        .unwrap();
        let config = merge_cli_with_config(&cli, base).unwrap();

        assert_eq!(config.workers.count, 2);
        assert_eq!(config.scan.pattern(), "cat");
        assert_eq!(config.scan.source, PathBuf::from("b.txt"));
        assert_eq!(config.scan.split, SplitMode::Whitespace);
        assert_eq!(config.workers.think_time_us, Some(10_000));
        // Not given on the command line
        assert_eq!(config.counting.pool_size, 4);
    }

    #[test]
    fn test_invalid_think_time() {
        let cli = Cli::try_parse_from(["wordscan", "1", "cat", "in", "--think-time", "later"]).unwrap();
        assert!(merge_cli_with_config(&cli, Config::default()).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\npattern = \"cat\"\nsource = \"in.txt\"\n[workers]\ncount = 3").unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["wordscan", "--config", path.as_str(), "--counters", "2"]).unwrap();
        let config = load_config(&cli).unwrap();

        assert_eq!(config.workers.count, 3);
        assert_eq!(config.scan.pattern(), "cat");
        assert_eq!(config.counting.pool_size, 2);
    }

    #[test]
    fn test_toml_without_pattern_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nsource = \"in.txt\"\n[workers]\ncount = 2").unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["wordscan", "--config", path.as_str()]).unwrap();
        cli.validate().unwrap();

        let config = load_config(&cli).unwrap();
        assert!(config.scan.pattern.is_none());
        let err = crate::config::validator::validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("pattern is required"));
    }

    #[test]
    fn test_toml_explicit_empty_pattern_is_kept() {
        let config = parse_toml_string("[scan]\npattern = \"\"\nsource = \"in.txt\"\n").unwrap();
        assert_eq!(config.scan.pattern.as_deref(), Some(""));
        assert!(crate::config::validator::validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let cli = Cli::try_parse_from(["wordscan", "--config", "/nonexistent/wordscan.toml"]).unwrap();
        let err = load_config(&cli).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
