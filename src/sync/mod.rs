//! Synchronization protocol
//!
//! Exclusive access to the counting service is the combination of two pieces:
//!
//! - [`mutex`]: a single-slot token channel acting as a binary lock
//! - [`rendezvous`]: a capacity-1 request/reply channel pair
//!
//! Neither is sufficient alone. The mutex guarantees one caller at a time; the
//! single slots guarantee that caller's request is the only one queued and
//! that the next reply is its own. [`SerializedCounter`] is the one entry point
//! workers use, so the sequence acquire → request → reply → release cannot be
//! reordered or partially skipped.

pub mod mutex;
pub mod rendezvous;

use crate::channel::ChannelError;
use crate::protocol::WordRequest;
use crate::util::cancel::CancellationToken;
use mutex::MutexToken;
use rendezvous::CountingClient;
use std::time::{Duration, Instant};

/// Outcome of one serialized call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountedWord {
    /// Digit count returned by the service
    pub digits: u32,
    /// Time spent waiting for the mutex token
    pub wait: Duration,
    /// Time the token was held (request + reply)
    pub held: Duration,
}

/// Mutex-protected client of the counting service
#[derive(Clone, Debug)]
pub struct SerializedCounter {
    mutex: MutexToken,
    client: CountingClient,
}

impl SerializedCounter {
    pub fn new(mutex: MutexToken, client: CountingClient) -> Self {
        Self { mutex, client }
    }

    /// Run one critical section for `request`
    ///
    /// The critical section covers exactly this word's request/reply pair.
    /// If the call is interrupted after the token was taken, the token is
    /// abandoned rather than released.
    ///
    /// # Returns
    ///
    /// The digit count together with the time spent waiting for the token
    /// and the time it was held.
    ///
    /// # Errors
    ///
    /// `ChannelError::Cancelled` when `cancel` fires at any point, or
    /// `ChannelError::Disconnected` when the counting side is gone.
    pub fn count(&self, request: WordRequest, cancel: &CancellationToken) -> Result<CountedWord, ChannelError> {
        let wait_start = Instant::now();
        let guard = self.mutex.acquire(cancel)?;
        let acquired = Instant::now();

        match self.client.call(&guard, request, cancel) {
            Ok(reply) => {
                guard.release();
                Ok(CountedWord {
                    digits: reply.0,
                    wait: acquired.duration_since(wait_start),
                    held: acquired.elapsed(),
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "counting call interrupted inside critical section");
                guard.abandon();
                Err(e)
            }
        }
    }
}
