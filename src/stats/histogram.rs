//! Latency histogram for critical-section timings
//!
//! Thin wrapper over HdrHistogram used to track how long workers wait for the
//! mutex token and how long they hold it. Range is 1ns to 1 hour with three
//! significant digits.
//!
//! ```
//! use wordscan::stats::histogram::LatencyHistogram;
//! use std::time::Duration;
//!
//! let mut hist = LatencyHistogram::new();
//! hist.record(Duration::from_micros(100));
//! hist.record(Duration::from_micros(300));
//!
//! assert_eq!(hist.len(), 2);
//! assert!(hist.percentile(50.0).is_some());
//! ```

use crate::Result;
use hdrhistogram::Histogram;
use std::time::Duration;

const MAX_TRACKED_NANOS: u64 = 3_600_000_000_000;

/// Latency histogram wrapper
///
/// One instance per worker and per quantity (token wait, token held).
/// Instances are merged after the workers have been joined.
///
/// # Range
///
/// - **Minimum**: 1 nanosecond
/// - **Maximum**: 1 hour; longer samples are clamped
/// - **Precision**: 3 significant digits (within 0.1%)
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create an empty histogram covering 1ns to 1 hour
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_NANOS, 3)
            .expect("Failed to create histogram with valid bounds");

        Self { histogram }
    }

    /// Record one sample, clamped to the tracked range
    ///
    /// # Arguments
    ///
    /// * `latency` - Time spent waiting for or holding the mutex token
    ///
    /// # Example
    ///
    /// ```
    /// use wordscan::stats::histogram::LatencyHistogram;
    /// use std::time::Duration;
    ///
    /// let mut hist = LatencyHistogram::new();
    /// hist.record(Duration::ZERO);
    /// hist.record(Duration::from_secs(7200));
    ///
    /// // Both samples land inside the tracked range
    /// assert_eq!(hist.len(), 2);
    /// assert!(hist.max().unwrap() <= Duration::from_secs(3601));
    /// ```
    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let nanos = latency.as_nanos().min(MAX_TRACKED_NANOS as u128) as u64;
        let _ = self.histogram.record(nanos.max(1));
    }

    /// Get the value at a specific percentile
    ///
    /// # Arguments
    ///
    /// * `percentile` - The percentile to query (0.0 - 100.0)
    ///
    /// # Returns
    ///
    /// The latency at `percentile`, or None if nothing was recorded.
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.value_at_percentile(percentile)))
    }

    pub fn min(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.mean() as u64))
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Fold another worker's samples into this histogram
    ///
    /// # Errors
    ///
    /// Fails if `other` holds values this histogram cannot represent, which
    /// does not happen for histograms built with [`LatencyHistogram::new`].
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<()> {
        self.histogram
            .add(&other.histogram)
            .map_err(|e| anyhow::anyhow!("Failed to merge histograms: {}", e))?;
        Ok(())
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_histogram() {
        let hist = LatencyHistogram::new();
        assert!(hist.is_empty());
        assert!(hist.percentile(50.0).is_none());
        assert!(hist.min().is_none());
        assert!(hist.mean().is_none());
    }

    #[test]
    fn test_percentiles() {
        let mut hist = LatencyHistogram::new();
        for i in 1..=100 {
            hist.record(Duration::from_micros(i * 10));
        }

        let p50 = hist.percentile(50.0).unwrap();
        let p99 = hist.percentile(99.0).unwrap();
        assert!(p50.as_micros() >= 450 && p50.as_micros() <= 550);
        assert!(p99.as_micros() >= 940 && p99.as_micros() <= 1040);
    }

    #[test]
    fn test_zero_duration_is_recorded() {
        let mut hist = LatencyHistogram::new();
        hist.record(Duration::ZERO);
        assert_eq!(hist.len(), 1);
        assert_eq!(hist.min(), Some(Duration::from_nanos(1)));
    }

    #[test]
    fn test_merge() {
        let mut a = LatencyHistogram::new();
        a.record(Duration::from_micros(100));

        let mut b = LatencyHistogram::new();
        b.record(Duration::from_micros(300));
        b.record(Duration::from_micros(500));

        a.merge(&b).unwrap();
        assert_eq!(a.len(), 3);
        let max = a.max().unwrap();
        assert!(max.as_micros() >= 495 && max.as_micros() <= 505);
    }
}
