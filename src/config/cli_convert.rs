//! CLI to Config conversion utilities

use crate::config::cli;
use crate::worker;
use anyhow::{Context, Result};

/// Parse a time string (e.g., "100us", "1ms", "2s") to microseconds
///
/// A bare number is taken as microseconds.
pub fn parse_time_us(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("us") {
        (s.trim_end_matches("us"), 1u64)
    } else if s.ends_with("ms") {
        (s.trim_end_matches("ms"), 1000)
    } else if s.ends_with('s') {
        (s.trim_end_matches('s'), 1_000_000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid time format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Time out of range: {}", s))
}

/// Convert CLI SplitMode to worker SplitMode
pub fn convert_split_mode(cli_mode: cli::SplitMode) -> worker::SplitMode {
    match cli_mode {
        cli::SplitMode::Space => worker::SplitMode::Space,
        cli::SplitMode::Whitespace => worker::SplitMode::Whitespace,
    }
}
