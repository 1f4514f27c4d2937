//! Request/reply rendezvous with the counting service
//!
//! Two channels of capacity 1: word-request (worker → service) and
//! digit-reply (service → worker). The capacity alone does not make this a
//! synchronous call; with two concurrent callers a reply could reach the wrong
//! worker. The mutex token closes that gap, and the API enforces it:
//! [`CountingClient::call`] only accepts a caller holding a [`TokenGuard`].

use super::mutex::TokenGuard;
use crate::channel::{self, ChannelError, ChannelName, ChannelRx, ChannelTx};
use crate::protocol::{DigitReply, WordRequest};
use crate::util::cancel::CancellationToken;

/// In-flight limit per direction. Fixed; raising it breaks reply routing.
const CALL_SLOTS: usize = 1;

/// Create the word-request/digit-reply pair
pub fn pair() -> Result<(CountingClient, CountingEndpoint), ChannelError> {
    let (request_tx, request_rx) = channel::named(ChannelName::WordRequest, CALL_SLOTS)?;
    let (reply_tx, reply_rx) = channel::named(ChannelName::DigitReply, CALL_SLOTS)?;

    Ok((
        CountingClient {
            requests: request_tx,
            replies: reply_rx,
        },
        CountingEndpoint {
            requests: request_rx,
            replies: reply_tx,
        },
    ))
}

/// Worker side of the rendezvous
#[derive(Clone, Debug)]
pub struct CountingClient {
    requests: ChannelTx<WordRequest>,
    replies: ChannelRx<DigitReply>,
}

impl CountingClient {
    /// Send one word and wait for its digit count
    ///
    /// `_held` ties the call to the critical section: the send blocks until
    /// the service has drained the previous request, the receive blocks until
    /// the matching reply is produced.
    pub fn call(
        &self,
        _held: &TokenGuard<'_>,
        request: WordRequest,
        cancel: &CancellationToken,
    ) -> Result<DigitReply, ChannelError> {
        self.requests.send(request, cancel)?;
        self.replies.recv(cancel)
    }

    #[cfg(test)]
    pub(crate) fn endpoints(&self) -> (ChannelTx<WordRequest>, ChannelRx<DigitReply>) {
        (self.requests.clone(), self.replies.clone())
    }
}

/// Service side of the rendezvous
#[derive(Clone, Debug)]
pub struct CountingEndpoint {
    requests: ChannelRx<WordRequest>,
    replies: ChannelTx<DigitReply>,
}

impl CountingEndpoint {
    /// Wait for the next word request
    pub fn next_request(&self, cancel: &CancellationToken) -> Result<WordRequest, ChannelError> {
        self.requests.recv(cancel)
    }

    /// Answer the request taken by the last `next_request`
    pub fn reply(&self, reply: DigitReply, cancel: &CancellationToken) -> Result<(), ChannelError> {
        self.replies.send(reply, cancel)
    }

    pub fn request_capacity(&self) -> Option<usize> {
        self.requests.capacity()
    }

    pub fn reply_capacity(&self) -> Option<usize> {
        self.replies.capacity()
    }
}
