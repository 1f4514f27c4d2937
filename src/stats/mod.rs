//! Statistics collection
//!
//! - [`WorkerStats`]: per-worker task/match counts plus critical-section timings
//! - [`ServiceStats`]: per-service request counts
//! - [`aggregator`]: sums partial results into the run's aggregate
//!
//! Worker and service statistics are owned by their thread and handed back
//! when the thread exits; nothing here is shared while a run is in progress.

pub mod aggregator;
pub mod histogram;

use crate::protocol::PartialResult;
use crate::Result;
use histogram::LatencyHistogram;
use std::time::Duration;

/// Statistics gathered by one worker
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Line tasks fully processed (partial result sent)
    pub tasks: u64,
    /// Words that matched the pattern
    pub words_matched: u64,
    /// Digits reported by the counting service
    pub digits_counted: u64,
    /// Time spent waiting for the mutex token
    lock_wait: LatencyHistogram,
    /// Time the mutex token was held
    lock_held: LatencyHistogram,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a finished task
    pub fn record_task(&mut self, result: &PartialResult) {
        self.tasks += 1;
        self.words_matched += u64::from(result.word_count);
        self.digits_counted += u64::from(result.digit_count);
    }

    /// Account for one completed critical section
    pub fn record_critical_section(&mut self, wait: Duration, held: Duration) {
        self.lock_wait.record(wait);
        self.lock_held.record(held);
    }

    /// Number of times the mutex token was acquired and released
    pub fn acquisitions(&self) -> u64 {
        self.lock_wait.len()
    }

    pub fn lock_wait(&self) -> &LatencyHistogram {
        &self.lock_wait
    }

    pub fn lock_held(&self) -> &LatencyHistogram {
        &self.lock_held
    }

    /// Merge another worker's statistics into this one
    pub fn merge(&mut self, other: &WorkerStats) -> Result<()> {
        self.tasks += other.tasks;
        self.words_matched += other.words_matched;
        self.digits_counted += other.digits_counted;
        self.lock_wait.merge(&other.lock_wait)?;
        self.lock_held.merge(&other.lock_held)?;
        Ok(())
    }
}

/// Statistics gathered by one counting service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub requests: u64,
    pub digits: u64,
}

impl ServiceStats {
    pub fn record_request(&mut self, digits: u32) {
        self.requests += 1;
        self.digits += u64::from(digits);
    }

    pub fn merge(&mut self, other: &ServiceStats) {
        self.requests += other.requests;
        self.digits += other.digits;
    }
}
