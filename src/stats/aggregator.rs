//! Partial result aggregation
//!
//! The coordinator feeds every [`PartialResult`] it receives into a
//! [`ResultAggregator`]. Aggregation is a plain sum, so the order in which
//! workers deliver their results does not matter.
//!
//! ```
//! use wordscan::protocol::PartialResult;
//! use wordscan::stats::aggregator::ResultAggregator;
//!
//! let mut aggregator = ResultAggregator::new();
//! aggregator.absorb(PartialResult { word_count: 1, digit_count: 1 });
//! aggregator.absorb(PartialResult { word_count: 1, digit_count: 0 });
//!
//! assert!(aggregator.is_complete(2));
//! let total = aggregator.finish();
//! assert_eq!((total.word_count, total.digit_count), (2, 1));
//! ```

use crate::protocol::PartialResult;
use serde::Serialize;

/// Totals across every task of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    /// Partial results summed
    pub results: u64,
    pub word_count: u64,
    pub digit_count: u64,
}

/// Running sum of partial results
#[derive(Debug, Default)]
pub struct ResultAggregator {
    totals: AggregateResult,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, result: PartialResult) {
        self.totals.results += 1;
        self.totals.word_count += u64::from(result.word_count);
        self.totals.digit_count += u64::from(result.digit_count);
    }

    /// Partial results received so far
    pub fn received(&self) -> u64 {
        self.totals.results
    }

    /// Whether exactly `expected` results have been received
    pub fn is_complete(&self, expected: u64) -> bool {
        self.totals.results == expected
    }

    pub fn finish(self) -> AggregateResult {
        self.totals
    }
}
