//! Channel set
//!
//! The coordinator creates five bounded channels before anything else runs:
//!
//! | Channel      | Capacity     | Carries                    |
//! |--------------|--------------|----------------------------|
//! | line-task    | worker count | `LineTask`                 |
//! | result       | worker count | `PartialResult`            |
//! | word-request | 1            | `WordRequest`              |
//! | digit-reply  | 1            | `DigitReply`               |
//! | mutex-token  | 1            | `Token` (pre-loaded, free) |
//!
//! The set keeps one endpoint of every channel until [`ChannelSet::release`]
//! is called, so a channel stays open for the whole run even if every process
//! using it has exited. Processes get their own clones of the endpoints they
//! need through [`ChannelSet::worker_channels`] and
//! [`ChannelSet::counting_endpoint`].
//!
//! All blocking operations take a [`CancellationToken`] and wait on it
//! together with the channel, which keeps "full channel send" and "empty
//! channel receive" the only suspension points while still letting the
//! coordinator terminate a blocked process.

use crate::protocol::{LineTask, PartialResult};
use crate::sync::mutex::MutexToken;
use crate::sync::rendezvous::{self, CountingClient, CountingEndpoint};
use crate::sync::SerializedCounter;
use crate::util::cancel::CancellationToken;
use crossbeam::channel::{self, Receiver, Select, Sender};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Names of the channels in the set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelName {
    LineTask,
    Result,
    WordRequest,
    DigitReply,
    MutexToken,
}

impl ChannelName {
    /// Every channel, in creation order
    pub const ALL: [ChannelName; 5] = [
        ChannelName::LineTask,
        ChannelName::Result,
        ChannelName::WordRequest,
        ChannelName::DigitReply,
        ChannelName::MutexToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelName::LineTask => "line-task",
            ChannelName::Result => "result",
            ChannelName::WordRequest => "word-request",
            ChannelName::DigitReply => "digit-reply",
            ChannelName::MutexToken => "mutex-token",
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel operation or creation failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("operation on {channel} channel cancelled")]
    Cancelled { channel: ChannelName },

    #[error("{channel} channel disconnected")]
    Disconnected { channel: ChannelName },

    #[error("{channel} channel cannot be created with capacity {capacity}")]
    InvalidCapacity {
        channel: ChannelName,
        capacity: usize,
    },

    #[error("mutex token could not be placed in the {channel} channel")]
    TokenUnavailable { channel: ChannelName },
}

impl ChannelError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChannelError::Cancelled { .. })
    }
}

/// Sending half of a named channel
pub struct ChannelTx<T> {
    name: ChannelName,
    tx: Sender<T>,
}

/// Receiving half of a named channel
pub struct ChannelRx<T> {
    name: ChannelName,
    rx: Receiver<T>,
}

/// Create a named bounded channel
///
/// Capacity 0 is rejected: a zero-capacity crossbeam channel is a pure
/// hand-off, which is not what any channel in the set models.
pub fn named<T>(name: ChannelName, capacity: usize) -> Result<(ChannelTx<T>, ChannelRx<T>), ChannelError> {
    if capacity == 0 {
        return Err(ChannelError::InvalidCapacity {
            channel: name,
            capacity,
        });
    }
    let (tx, rx) = channel::bounded(capacity);
    Ok((ChannelTx { name, tx }, ChannelRx { name, rx }))
}

impl<T> ChannelTx<T> {
    pub fn name(&self) -> ChannelName {
        self.name
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }

    /// Messages currently queued
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Send `msg`, blocking while the channel is full
    pub fn send(&self, msg: T, cancel: &CancellationToken) -> Result<(), ChannelError> {
        if cancel.is_cancelled() {
            return Err(ChannelError::Cancelled { channel: self.name });
        }

        let mut sel = Select::new();
        let send_idx = sel.send(&self.tx);
        let cancel_idx = sel.recv(cancel.signal());
        let oper = sel.select();

        if oper.index() == send_idx {
            oper.send(&self.tx, msg)
                .map_err(|_| ChannelError::Disconnected { channel: self.name })
        } else {
            debug_assert_eq!(oper.index(), cancel_idx);
            let _ = oper.recv(cancel.signal());
            Err(ChannelError::Cancelled { channel: self.name })
        }
    }

    /// Send `msg`, draining `drain` into `on_message` while waiting for room
    ///
    /// Used by the coordinator so that a full line-task channel and a full
    /// result channel can never block each other.
    pub fn send_draining<U>(
        &self,
        msg: T,
        drain: &ChannelRx<U>,
        cancel: &CancellationToken,
        mut on_message: impl FnMut(U),
    ) -> Result<(), ChannelError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ChannelError::Cancelled { channel: self.name });
            }

            let mut sel = Select::new();
            let send_idx = sel.send(&self.tx);
            let drain_idx = sel.recv(&drain.rx);
            let cancel_idx = sel.recv(cancel.signal());
            let oper = sel.select();

            match oper.index() {
                i if i == send_idx => {
                    return oper
                        .send(&self.tx, msg)
                        .map_err(|_| ChannelError::Disconnected { channel: self.name });
                }
                i if i == drain_idx => {
                    let received = oper
                        .recv(&drain.rx)
                        .map_err(|_| ChannelError::Disconnected { channel: drain.name })?;
                    on_message(received);
                }
                i => {
                    debug_assert_eq!(i, cancel_idx);
                    let _ = oper.recv(cancel.signal());
                    return Err(ChannelError::Cancelled { channel: self.name });
                }
            }
        }
    }
}

impl<T> ChannelRx<T> {
    pub fn name(&self) -> ChannelName {
        self.name
    }

    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }

    /// Messages currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Receive one message, blocking while the channel is empty
    pub fn recv(&self, cancel: &CancellationToken) -> Result<T, ChannelError> {
        if cancel.is_cancelled() {
            return Err(ChannelError::Cancelled { channel: self.name });
        }

        let mut sel = Select::new();
        let recv_idx = sel.recv(&self.rx);
        let cancel_idx = sel.recv(cancel.signal());
        let oper = sel.select();

        if oper.index() == recv_idx {
            oper.recv(&self.rx)
                .map_err(|_| ChannelError::Disconnected { channel: self.name })
        } else {
            debug_assert_eq!(oper.index(), cancel_idx);
            let _ = oper.recv(cancel.signal());
            Err(ChannelError::Cancelled { channel: self.name })
        }
    }
}

impl<T> Clone for ChannelTx<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Clone for ChannelRx<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            rx: self.rx.clone(),
        }
    }
}

impl<T> fmt::Debug for ChannelTx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTx")
            .field("name", &self.name)
            .field("len", &self.tx.len())
            .finish()
    }
}

impl<T> fmt::Debug for ChannelRx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRx")
            .field("name", &self.name)
            .field("len", &self.rx.len())
            .finish()
    }
}

/// Endpoints handed to one worker
pub struct WorkerChannels {
    pub tasks: ChannelRx<LineTask>,
    pub results: ChannelTx<PartialResult>,
    pub counter: SerializedCounter,
}

/// All channels of one run
pub struct ChannelSet {
    task_tx: ChannelTx<LineTask>,
    task_rx: ChannelRx<LineTask>,
    result_tx: ChannelTx<PartialResult>,
    result_rx: ChannelRx<PartialResult>,
    client: CountingClient,
    endpoint: CountingEndpoint,
    mutex: MutexToken,
}

impl ChannelSet {
    /// Create every channel and load the mutex token
    ///
    /// # Errors
    ///
    /// Fails with `InvalidCapacity` when `worker_count` is 0, or with
    /// `TokenUnavailable` if the mutex channel cannot be pre-loaded.
    pub fn create(worker_count: usize) -> Result<Self, ChannelError> {
        let (task_tx, task_rx) = named(ChannelName::LineTask, worker_count)?;
        let (result_tx, result_rx) = named(ChannelName::Result, worker_count)?;
        let (client, endpoint) = rendezvous::pair()?;
        let mutex = MutexToken::new()?;

        tracing::debug!(worker_count, "channel set created");

        Ok(Self {
            task_tx,
            task_rx,
            result_tx,
            result_rx,
            client,
            endpoint,
            mutex,
        })
    }

    /// Sending side of the line-task channel (coordinator)
    pub fn task_sender(&self) -> &ChannelTx<LineTask> {
        &self.task_tx
    }

    /// Receiving side of the result channel (coordinator)
    pub fn result_receiver(&self) -> &ChannelRx<PartialResult> {
        &self.result_rx
    }

    /// Endpoints for a new worker
    pub fn worker_channels(&self) -> WorkerChannels {
        WorkerChannels {
            tasks: self.task_rx.clone(),
            results: self.result_tx.clone(),
            counter: SerializedCounter::new(self.mutex.clone(), self.client.clone()),
        }
    }

    /// Endpoint for a new counting service
    pub fn counting_endpoint(&self) -> CountingEndpoint {
        self.endpoint.clone()
    }

    /// The mutex token channel
    #[cfg(test)]
    pub(crate) fn mutex(&self) -> &MutexToken {
        &self.mutex
    }

    /// Drop the set's endpoints of every channel
    ///
    /// Returns the released channel names in creation order. A channel is
    /// gone once every process holding a clone of its endpoints has exited
    /// as well; the coordinator joins them all before releasing.
    pub fn release(self) -> Vec<ChannelName> {
        let Self {
            task_tx,
            task_rx,
            result_tx,
            result_rx,
            client,
            endpoint,
            mutex,
        } = self;

        drop((task_tx, task_rx));
        drop((result_tx, result_rx));
        drop((client, endpoint));
        drop(mutex);

        tracing::debug!("channel set released");
        ChannelName::ALL.to_vec()
    }

    /// Extra endpoints that notice when the rest of the set is gone
    #[cfg(test)]
    pub(crate) fn observer(&self) -> ChannelObserver {
        let (requests, replies) = self.client.endpoints();
        ChannelObserver {
            tasks: self.task_tx.clone(),
            results: self.result_rx.clone(),
            requests,
            replies,
            token: self.mutex.watch(),
        }
    }
}

/// One outside endpoint per channel, held past release
///
/// Each endpoint faces the side that every process and the set itself hold,
/// so it reports disconnection only after all of those have been dropped.
#[cfg(test)]
pub(crate) struct ChannelObserver {
    tasks: ChannelTx<LineTask>,
    results: ChannelRx<PartialResult>,
    requests: ChannelTx<crate::protocol::WordRequest>,
    replies: ChannelRx<crate::protocol::DigitReply>,
    token: Receiver<crate::sync::mutex::Token>,
}

#[cfg(test)]
impl ChannelObserver {
    /// Channels with no endpoint left apart from this observer's
    ///
    /// Consumes whatever is queued and may enqueue a message, so only call
    /// it once the channels are no longer in use.
    pub(crate) fn disconnected(&self) -> Vec<ChannelName> {
        fn drained<T>(rx: &Receiver<T>) -> bool {
            loop {
                match rx.try_recv() {
                    Ok(_) => continue,
                    Err(e) => return e.is_disconnected(),
                }
            }
        }

        let task = LineTask::new("", "").unwrap();
        let request = crate::protocol::WordRequest::new("0").unwrap();

        let mut gone = Vec::new();
        if self.tasks.tx.try_send(task).err().is_some_and(|e| e.is_disconnected()) {
            gone.push(ChannelName::LineTask);
        }
        if drained(&self.results.rx) {
            gone.push(ChannelName::Result);
        }
        if self.requests.tx.try_send(request).err().is_some_and(|e| e.is_disconnected()) {
            gone.push(ChannelName::WordRequest);
        }
        if drained(&self.replies.rx) {
            gone.push(ChannelName::DigitReply);
        }
        if drained(&self.token) {
            gone.push(ChannelName::MutexToken);
        }
        gone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_named_rejects_zero_capacity() {
        let err = named::<u32>(ChannelName::LineTask, 0).unwrap_err();
        assert_eq!(
            err,
            ChannelError::InvalidCapacity {
                channel: ChannelName::LineTask,
                capacity: 0
            }
        );
    }

    #[test]
    fn test_channel_set_capacities() {
        let set = ChannelSet::create(3).unwrap();
        assert_eq!(set.task_sender().capacity(), Some(3));
        assert_eq!(set.result_receiver().capacity(), Some(3));
        assert_eq!(set.mutex().available(), 1);

        let endpoint = set.counting_endpoint();
        assert_eq!(endpoint.request_capacity(), Some(1));
        assert_eq!(endpoint.reply_capacity(), Some(1));
    }

    #[test]
    fn test_channel_set_creation_fails_for_zero_workers() {
        assert!(matches!(
            ChannelSet::create(0),
            Err(ChannelError::InvalidCapacity { channel: ChannelName::LineTask, .. })
        ));
    }

    #[test]
    fn test_release_disconnects_every_channel() {
        let set = ChannelSet::create(1).unwrap();
        let observer = set.observer();
        assert!(observer.disconnected().is_empty());

        let released = set.release();
        assert_eq!(released, ChannelName::ALL.to_vec());
        assert_eq!(observer.disconnected(), ChannelName::ALL.to_vec());
    }

    #[test]
    fn test_channels_outlive_release_while_endpoints_are_held() {
        let set = ChannelSet::create(2).unwrap();
        let observer = set.observer();
        let worker = set.worker_channels();
        let service = set.counting_endpoint();

        set.release();
        assert!(observer.disconnected().is_empty());

        drop(worker);
        assert_eq!(
            observer.disconnected(),
            vec![ChannelName::LineTask, ChannelName::Result, ChannelName::MutexToken]
        );

        drop(service);
        assert_eq!(observer.disconnected(), ChannelName::ALL.to_vec());
    }

    #[test]
    fn test_fifo_order_per_channel() {
        let cancel = CancellationToken::new();
        let (tx, rx) = named::<u32>(ChannelName::Result, 4).unwrap();
        for i in 0..4 {
            tx.send(i, &cancel).unwrap();
        }
        let received: Vec<u32> = (0..4).map(|_| rx.recv(&cancel).unwrap()).collect();
        assert_eq!(received, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_recv_on_empty_channel_is_cancellable() {
        let cancel = CancellationToken::new();
        let (_tx, rx) = named::<u32>(ChannelName::LineTask, 1).unwrap();

        let remote = cancel.clone();
        let waiter = std::thread::spawn(move || rx.recv(&remote));
        std::thread::sleep(Duration::from_millis(20));
        cancel.cancel();

        assert_eq!(
            waiter.join().unwrap(),
            Err(ChannelError::Cancelled { channel: ChannelName::LineTask })
        );
    }

    #[test]
    fn test_send_on_full_channel_is_cancellable() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = named::<u32>(ChannelName::Result, 1).unwrap();
        tx.send(1, &cancel).unwrap();

        let remote = cancel.clone();
        let waiter = std::thread::spawn(move || tx.send(2, &remote));
        std::thread::sleep(Duration::from_millis(20));
        cancel.cancel();

        assert!(waiter.join().unwrap().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_recv_reports_disconnect() {
        let cancel = CancellationToken::new();
        let (tx, rx) = named::<u32>(ChannelName::DigitReply, 1).unwrap();
        drop(tx);
        assert_eq!(
            rx.recv(&cancel),
            Err(ChannelError::Disconnected { channel: ChannelName::DigitReply })
        );
    }

    #[test]
    fn test_send_draining_makes_progress_on_both_channels() {
        let cancel = CancellationToken::new();
        let (task_tx, task_rx) = named::<u32>(ChannelName::LineTask, 1).unwrap();
        let (result_tx, result_rx) = named::<u32>(ChannelName::Result, 1).unwrap();

        // Echo stage: takes a task, then blocks on the result channel
        let echo_cancel = cancel.clone();
        let echo = std::thread::spawn(move || {
            for _ in 0..10 {
                let task = task_rx.recv(&echo_cancel).unwrap();
                result_tx.send(task * 10, &echo_cancel).unwrap();
            }
        });

        let mut drained = Vec::new();
        for i in 0..10 {
            task_tx
                .send_draining(i, &result_rx, &cancel, |r| drained.push(r))
                .unwrap();
        }
        while drained.len() < 10 {
            drained.push(result_rx.recv(&cancel).unwrap());
        }
        echo.join().unwrap();

        assert_eq!(drained, (0..10).map(|i| i * 10).collect::<Vec<_>>());
    }
}
