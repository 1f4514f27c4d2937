//! Single-slot mutex token
//!
//! A binary lock built from a capacity-1 channel holding one opaque
//! [`Token`]. The token sitting in the channel means "free"; an empty channel
//! means "held". Acquire receives the token (blocking while another holder has
//! it), release sends it back.
//!
//! Release can never block: only the current holder sends, and only after
//! taking the token out, so the slot is always empty at that moment. That
//! argument holds only while no other actor sends into the channel, which is
//! why the sending side never leaves this module and the capacity is a
//! private constant rather than a parameter.

use crate::channel::{ChannelError, ChannelName};
use crate::util::cancel::CancellationToken;
use crossbeam::channel::{self, Receiver, Select, Sender, TrySendError};
use std::fmt;

/// Slot count of the token channel. Anything above 1 breaks exclusivity.
const TOKEN_SLOTS: usize = 1;

/// The opaque one-byte token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token(u8);

/// Binary lock shared by every worker
#[derive(Clone)]
pub struct MutexToken {
    tx: Sender<Token>,
    rx: Receiver<Token>,
}

impl MutexToken {
    /// Create the channel and load the single token (lock starts free)
    pub fn new() -> Result<Self, ChannelError> {
        let (tx, rx) = channel::bounded(TOKEN_SLOTS);
        tx.try_send(Token(0)).map_err(|_| ChannelError::TokenUnavailable {
            channel: ChannelName::MutexToken,
        })?;
        Ok(Self { tx, rx })
    }

    /// Take the token, suspending while another holder has it
    pub fn acquire(&self, cancel: &CancellationToken) -> Result<TokenGuard<'_>, ChannelError> {
        if cancel.is_cancelled() {
            return Err(ChannelError::Cancelled {
                channel: ChannelName::MutexToken,
            });
        }

        let mut sel = Select::new();
        let token_idx = sel.recv(&self.rx);
        let _cancel_idx = sel.recv(cancel.signal());
        let oper = sel.select();

        if oper.index() == token_idx {
            let token = oper.recv(&self.rx).map_err(|_| ChannelError::Disconnected {
                channel: ChannelName::MutexToken,
            })?;
            Ok(TokenGuard {
                owner: self,
                token: Some(token),
            })
        } else {
            let _ = oper.recv(cancel.signal());
            Err(ChannelError::Cancelled {
                channel: ChannelName::MutexToken,
            })
        }
    }

    /// Take the token only if it is free right now
    #[cfg(test)]
    pub(crate) fn try_acquire(&self) -> Option<TokenGuard<'_>> {
        self.rx.try_recv().ok().map(|token| TokenGuard {
            owner: self,
            token: Some(token),
        })
    }

    /// Extra receiving end; disconnects once every `MutexToken` clone is gone
    #[cfg(test)]
    pub(crate) fn watch(&self) -> Receiver<Token> {
        self.rx.clone()
    }

    /// Tokens currently in the channel: 1 when free, 0 when held
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    fn put_back(&self, token: Token) {
        match self.tx.try_send(token) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::error!("mutex token released while the slot was occupied");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("mutex token channel disconnected on release");
            }
        }
    }
}

impl fmt::Debug for MutexToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexToken")
            .field("available", &self.available())
            .finish()
    }
}

/// Proof of holding the token; releases it when dropped
///
/// Only a guard can open a counting call (see
/// [`CountingClient::call`](super::rendezvous::CountingClient::call)).
pub struct TokenGuard<'a> {
    owner: &'a MutexToken,
    token: Option<Token>,
}

impl TokenGuard<'_> {
    /// Release the token explicitly
    pub fn release(self) {
        drop(self);
    }

    /// Leave the critical section without returning the token
    ///
    /// Used when a call is interrupted half-way: a reply may still be on its
    /// way, so nobody else may start a call. The lock stays held until the
    /// channel set is released.
    pub fn abandon(mut self) {
        self.token.take();
    }
}

impl Drop for TokenGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.owner.put_back(token);
        }
    }
}
