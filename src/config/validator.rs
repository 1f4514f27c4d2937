//! Configuration validation

use super::*;
use crate::protocol::MAX_TEXT_LEN;
use anyhow::Result;

/// Largest worker pool accepted
pub const MAX_WORKERS: usize = 1024;

/// Largest counting service pool accepted
pub const MAX_COUNTERS: usize = 64;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_scan(&config.scan)?;
    validate_workers(&config.workers)?;
    validate_counting(&config.counting)?;
    validate_output(&config.output)?;

    Ok(())
}

/// Validate scan configuration
pub fn validate_scan(scan: &ScanConfig) -> Result<()> {
    let pattern = match &scan.pattern {
        Some(pattern) => pattern,
        None => anyhow::bail!("pattern is required"),
    };

    if pattern.len() > MAX_TEXT_LEN {
        anyhow::bail!(
            "pattern is {} bytes, must be at most {} bytes",
            pattern.len(),
            MAX_TEXT_LEN
        );
    }

    if scan.source.as_os_str().is_empty() {
        anyhow::bail!("source file is required");
    }

    Ok(())
}

/// Validate worker configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.count == 0 || workers.count > MAX_WORKERS {
        anyhow::bail!(
            "worker count must be between 1 and {}, got {}",
            MAX_WORKERS,
            workers.count
        );
    }

    Ok(())
}

/// Validate counting service configuration
pub fn validate_counting(counting: &CountingConfig) -> Result<()> {
    if counting.pool_size == 0 || counting.pool_size > MAX_COUNTERS {
        anyhow::bail!(
            "counting pool size must be between 1 and {}, got {}",
            MAX_COUNTERS,
            counting.pool_size
        );
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let Some(path) = &output.json_output {
        if path.as_os_str().is_empty() {
            anyhow::bail!("json output path cannot be empty");
        }
    }

    Ok(())
}
