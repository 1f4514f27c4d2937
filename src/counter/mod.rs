//! Counting service
//!
//! A single sequential loop: take one word request, count its decimal digits,
//! send the count back. The loop has no locking of its own. The mutex token
//! held by the calling worker guarantees at most one request is ever pending,
//! so the service is a single-consumer, single-producer loop by construction.
//!
//! The counting rule sits behind the [`DigitCounter`] trait so tests can
//! observe the service from the inside.

use crate::channel::ChannelError;
use crate::protocol::DigitReply;
use crate::stats::ServiceStats;
use crate::sync::rendezvous::CountingEndpoint;
use crate::util::cancel::CancellationToken;

/// Counting rule applied to each requested word
pub trait DigitCounter: Send + 'static {
    fn count(&self, word: &str) -> u32;
}

/// Counts ASCII decimal digits (`0`-`9`)
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalDigits;

impl DigitCounter for DecimalDigits {
    fn count(&self, word: &str) -> u32 {
        count_digits(word)
    }
}

/// Number of ASCII decimal digits in `word`
///
/// ```
/// assert_eq!(wordscan::counter::count_digits("cat22"), 2);
/// assert_eq!(wordscan::counter::count_digits("dog"), 0);
/// ```
pub fn count_digits(word: &str) -> u32 {
    word.bytes().filter(u8::is_ascii_digit).count() as u32
}

/// One counting service instance
pub struct CountingService<C = DecimalDigits> {
    id: usize,
    endpoint: CountingEndpoint,
    counter: C,
    stats: ServiceStats,
}

impl CountingService<DecimalDigits> {
    pub fn new(id: usize, endpoint: CountingEndpoint) -> Self {
        Self::with_counter(id, endpoint, DecimalDigits)
    }
}

impl<C: DigitCounter> CountingService<C> {
    pub fn with_counter(id: usize, endpoint: CountingEndpoint, counter: C) -> Self {
        Self {
            id,
            endpoint,
            counter,
            stats: ServiceStats::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Serve requests until cancelled
    ///
    /// Returns the service statistics on cancellation. Any other channel error
    /// ends the loop and is returned; it is never forwarded to a worker.
    pub fn run(mut self, cancel: &CancellationToken) -> Result<ServiceStats, ChannelError> {
        tracing::debug!(service = self.id, "counting service started");

        loop {
            match self.serve_one(cancel) {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    tracing::error!(service = self.id, error = %e, "counting service stopped");
                    return Err(e);
                }
            }
        }

        tracing::debug!(service = self.id, requests = self.stats.requests, "counting service exiting");
        Ok(self.stats)
    }

    fn serve_one(&mut self, cancel: &CancellationToken) -> Result<(), ChannelError> {
        let request = self.endpoint.next_request(cancel)?;
        let digits = self.counter.count(request.word());
        self.endpoint.reply(DigitReply(digits), cancel)?;
        self.stats.record_request(digits);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WordRequest;
    use crate::sync::mutex::MutexToken;
    use crate::sync::rendezvous;

    #[test]
    fn test_count_digits() {
        assert_eq!(count_digits("cat1"), 1);
        assert_eq!(count_digits("cat22"), 2);
        assert_eq!(count_digits("cat22\n"), 2);
        assert_eq!(count_digits(""), 0);
        assert_eq!(count_digits("0123456789"), 10);
    }

    #[test]
    fn test_non_ascii_digits_are_not_counted() {
        // Arabic-Indic digits and fullwidth digits
        assert_eq!(count_digits("٣٤"), 0);
        assert_eq!(count_digits("１２"), 0);
    }

    #[test]
    fn test_service_answers_and_stops_on_cancel() {
        let stop = CancellationToken::new();
        let caller = CancellationToken::new();
        let mutex = MutexToken::new().unwrap();
        let (client, endpoint) = rendezvous::pair().unwrap();

        let service = CountingService::new(0, endpoint);
        let service_stop = stop.clone();
        let handle = std::thread::spawn(move || service.run(&service_stop));

        for (word, expected) in [("a1b2", 2), ("none", 0), ("999", 3)] {
            let guard = mutex.acquire(&caller).unwrap();
            let reply = client
                .call(&guard, WordRequest::new(word).unwrap(), &caller)
                .unwrap();
            assert_eq!(reply, DigitReply(expected));
        }

        stop.cancel();
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.digits, 5);
    }
}
