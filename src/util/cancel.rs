//! Cooperative cancellation
//!
//! A `CancellationToken` is the termination directive the coordinator aims at
//! each spawned process. Every blocking point in a worker or counting service
//! waits on its data channel and on the token's signal channel at the same
//! time, so a cancelled process wakes up even while it is suspended.
//!
//! The signal is a zero-capacity channel whose only sender is dropped on
//! cancellation. A disconnected receiver is always ready, which makes the
//! token usable inside a crossbeam `Select` with no polling.
//!
//! # Example
//!
//! ```
//! use wordscan::util::cancel::CancellationToken;
//! use std::time::Duration;
//!
//! let token = CancellationToken::new();
//! let handle = token.clone();
//!
//! assert!(!token.is_cancelled());
//! handle.cancel();
//! assert!(token.is_cancelled());
//!
//! // A cancelled token cuts any pause short
//! assert!(!token.sleep(Duration::from_secs(60)));
//! ```

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Inner {
    cancelled: AtomicBool,
    /// Dropped on cancel to disconnect `signal`
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Clonable cancellation handle shared between a controller and its targets
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create a token in the "running" state
    pub fn new() -> Self {
        let (trigger, signal) = channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal,
            }),
        }
    }

    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut trigger) = self.inner.trigger.lock() {
            trigger.take();
        }
    }

    /// Whether `cancel()` has been called on this token or any clone
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled
    ///
    /// Never carries a message; only register it in a `Select` and treat any
    /// completion as cancellation.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Pause for `duration` unless cancelled first
    ///
    /// Returns `true` if the full pause elapsed, `false` if the token fired.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        matches!(
            self.inner.signal.recv_timeout(duration),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_new_token_is_running() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(
            token.signal().try_recv(),
            Err(crossbeam::channel::TryRecvError::Empty)
        );
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(
            token.signal().recv(),
            Err(crossbeam::channel::RecvError)
        );
    }

    #[test]
    fn test_sleep_elapses_when_running() {
        let token = CancellationToken::new();
        assert!(token.sleep(Duration::from_millis(5)));
    }

    #[test]
    fn test_cancel_wakes_sleeper() {
        let token = CancellationToken::new();
        let remote = token.clone();

        let start = Instant::now();
        let sleeper = std::thread::spawn(move || token.sleep(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(20));
        remote.cancel();

        assert!(!sleeper.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
