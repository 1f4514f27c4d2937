//! Worker thread implementation
//!
//! A Worker is one sequential loop over the line-task channel:
//!
//! 1. Receive a [`LineTask`] (suspends while the channel is empty)
//! 2. Split the text into tokens
//! 3. For every token that starts with the task's pattern, count it and ask
//!    the counting service for its digit count through the
//!    [`SerializedCounter`]. Each matched word is its own critical section,
//!    so workers interleave at word granularity.
//! 4. Optionally pause for the configured think time
//! 5. Send one [`PartialResult`] for the task
//!
//! Channel failures end the worker. They are logged here and returned from
//! [`Worker::run`] to whoever joins the thread; nothing is sent to the
//! coordinator, which keeps waiting for the missing result.
//!
//! # Example
//!
//! ```
//! use wordscan::channel::ChannelSet;
//! use wordscan::counter::CountingService;
//! use wordscan::protocol::LineTask;
//! use wordscan::worker::Worker;
//! use wordscan::CancellationToken;
//!
//! let set = ChannelSet::create(1)?;
//! let stop = CancellationToken::new();
//!
//! let service = CountingService::new(0, set.counting_endpoint());
//! let service_stop = stop.clone();
//! let service = std::thread::spawn(move || service.run(&service_stop));
//!
//! let worker = Worker::new(0, set.worker_channels());
//! let worker_stop = stop.clone();
//! let worker = std::thread::spawn(move || worker.run(&worker_stop));
//!
//! let main = CancellationToken::new();
//! set.task_sender().send(LineTask::new("cat1 dog cat22", "cat")?, &main)?;
//! let result = set.result_receiver().recv(&main)?;
//! assert_eq!((result.word_count, result.digit_count), (2, 3));
//!
//! stop.cancel();
//! worker.join().unwrap()?;
//! service.join().unwrap()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::channel::{ChannelError, WorkerChannels};
use crate::protocol::{LineTask, MessageError, PartialResult, WordRequest};
use crate::stats::WorkerStats;
use crate::sync::SerializedCounter;
use crate::util::cancel::CancellationToken;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How line text is split into tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Only U+0020 separates tokens; tabs and punctuation stay inside them
    #[default]
    Space,
    /// Any Unicode whitespace separates tokens
    Whitespace,
}

impl SplitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMode::Space => "space",
            SplitMode::Whitespace => "whitespace",
        }
    }
}

/// Tokens of `text` under `split`, skipping empty ones
///
/// # Arguments
///
/// * `text` - One line chunk
/// * `split` - Which characters separate tokens
///
/// # Example
///
/// ```
/// use wordscan::worker::{tokenize, SplitMode};
///
/// let line = "cat1  dog\tcat22";
/// assert_eq!(tokenize(line, SplitMode::Space).collect::<Vec<_>>(), vec!["cat1", "dog\tcat22"]);
/// assert_eq!(
///     tokenize(line, SplitMode::Whitespace).collect::<Vec<_>>(),
///     vec!["cat1", "dog", "cat22"]
/// );
/// ```
pub fn tokenize(text: &str, split: SplitMode) -> Box<dyn Iterator<Item = &str> + '_> {
    match split {
        SplitMode::Space => Box::new(text.split(' ').filter(|token| !token.is_empty())),
        SplitMode::Whitespace => Box::new(text.split_whitespace()),
    }
}

/// Literal, case-sensitive prefix test. The empty pattern matches every token.
#[inline]
pub fn matches_prefix(token: &str, pattern: &str) -> bool {
    token.starts_with(pattern)
}

/// Errors that end a worker
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("matched word rejected: {0}")]
    Message(#[from] MessageError),
}

impl WorkerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Channel(e) if e.is_cancelled())
    }
}

/// Worker thread state
///
/// Owns its channel endpoints and statistics; nothing is shared with other
/// workers except through those channels.
pub struct Worker {
    id: usize,
    label: String,
    channels: WorkerChannels,
    split: SplitMode,
    think_time: Option<Duration>,
    stats: WorkerStats,
}

impl Worker {
    /// Create worker `id` over its own channel endpoints
    ///
    /// # Arguments
    ///
    /// * `id` - Index in the pool; the thread is labelled `worker-{id}`
    /// * `channels` - Endpoints from [`ChannelSet::worker_channels`](crate::channel::ChannelSet::worker_channels)
    pub fn new(id: usize, channels: WorkerChannels) -> Self {
        Self {
            id,
            label: format!("worker-{}", id),
            channels,
            split: SplitMode::default(),
            think_time: None,
            stats: WorkerStats::new(),
        }
    }

    pub fn with_split(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    /// Pause after scanning each task
    ///
    /// None or a zero duration disables the pause. The pause is cut short
    /// when the worker is cancelled.
    pub fn with_think_time(mut self, think_time: Option<Duration>) -> Self {
        self.think_time = think_time.filter(|d| !d.is_zero());
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Process tasks until cancelled
    ///
    /// Cancellation, including cancellation in the middle of a task, returns
    /// the statistics gathered so far. A task interrupted that way produces
    /// no partial result.
    pub fn run(mut self, cancel: &CancellationToken) -> Result<WorkerStats, WorkerError> {
        tracing::debug!(worker = %self.label, split = self.split.as_str(), "worker started");

        loop {
            match self.step(cancel) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    tracing::error!(worker = %self.label, error = %e, "worker stopped");
                    return Err(e);
                }
            }
        }

        tracing::debug!(worker = %self.label, tasks = self.stats.tasks, "worker exiting");
        Ok(self.stats)
    }

    /// One task, start to finish. Ok(false) means cancelled during think time.
    fn step(&mut self, cancel: &CancellationToken) -> Result<bool, WorkerError> {
        let task = self.channels.tasks.recv(cancel)?;
        let result = self.process_task(&task, cancel)?;

        if let Some(pause) = self.think_time {
            if !cancel.sleep(pause) {
                return Ok(false);
            }
        }

        self.channels.results.send(result, cancel)?;
        self.stats.record_task(&result);
        Ok(true)
    }

    fn process_task(&mut self, task: &LineTask, cancel: &CancellationToken) -> Result<PartialResult, WorkerError> {
        let mut result = PartialResult::default();
        let pattern = task.pattern();

        for word in tokenize(task.text(), self.split) {
            if !matches_prefix(word, pattern) {
                continue;
            }
            result.word_count += 1;

            let counted = self.counter().count(WordRequest::new(word)?, cancel)?;
            self.stats.record_critical_section(counted.wait, counted.held);
            result.digit_count += counted.digits;

            tracing::debug!(
                worker = %self.label,
                pattern,
                word,
                digits = counted.digits,
                "match"
            );
        }

        Ok(result)
    }

    fn counter(&self) -> &SerializedCounter {
        &self.channels.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelSet;
    use crate::counter::CountingService;
    use crate::stats::ServiceStats;
    use std::thread::JoinHandle;
    use std::time::Instant;

    struct Harness {
        set: ChannelSet,
        stop: CancellationToken,
        main: CancellationToken,
        service: JoinHandle<Result<ServiceStats, ChannelError>>,
        workers: Vec<JoinHandle<Result<WorkerStats, WorkerError>>>,
    }

    impl Harness {
        fn start(workers: usize, split: SplitMode) -> Self {
            let set = ChannelSet::create(workers).unwrap();
            let stop = CancellationToken::new();

            let service = CountingService::new(0, set.counting_endpoint());
            let service_stop = stop.clone();
            let service = std::thread::spawn(move || service.run(&service_stop));

            let workers = (0..workers)
                .map(|id| {
                    let worker = Worker::new(id, set.worker_channels()).with_split(split);
                    let stop = stop.clone();
                    std::thread::spawn(move || worker.run(&stop))
                })
                .collect();

            Self {
                set,
                stop,
                main: CancellationToken::new(),
                service,
                workers,
            }
        }

        fn scan(&self, text: &str, pattern: &str) -> PartialResult {
            self.set
                .task_sender()
                .send(LineTask::new(text, pattern).unwrap(), &self.main)
                .unwrap();
            self.set.result_receiver().recv(&self.main).unwrap()
        }

        fn shutdown(self) -> Vec<WorkerStats> {
            self.stop.cancel();
            self.service.join().unwrap().unwrap();
            self.workers
                .into_iter()
                .map(|handle| handle.join().unwrap().unwrap())
                .collect()
        }
    }

    #[test]
    fn test_tokenize_space() {
        let tokens: Vec<_> = tokenize("  cat1  dog\tcat22 ", SplitMode::Space).collect();
        assert_eq!(tokens, vec!["cat1", "dog\tcat22"]);
    }

    #[test]
    fn test_tokenize_whitespace() {
        let tokens: Vec<_> = tokenize("  cat1  dog\tcat22 ", SplitMode::Whitespace).collect();
        assert_eq!(tokens, vec!["cat1", "dog", "cat22"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert_eq!(tokenize("", SplitMode::Space).count(), 0);
        assert_eq!(tokenize("   ", SplitMode::Whitespace).count(), 0);
    }

    #[test]
    fn test_matches_prefix() {
        assert!(matches_prefix("cat1", "cat"));
        assert!(matches_prefix("cat", "cat"));
        assert!(matches_prefix("cat,", "cat"));
        assert!(!matches_prefix("Cat1", "cat"));
        assert!(!matches_prefix("ca", "cat"));
        assert!(!matches_prefix("scat", "cat"));
        assert!(matches_prefix("anything", ""));
    }

    #[test]
    fn test_single_line_scenario() {
        let harness = Harness::start(1, SplitMode::Space);
        let result = harness.scan("cat1 dog cat22", "cat");
        assert_eq!(result, PartialResult { word_count: 2, digit_count: 3 });

        let stats = harness.shutdown();
        assert_eq!(stats[0].tasks, 1);
        assert_eq!(stats[0].words_matched, 2);
        assert_eq!(stats[0].acquisitions(), 2);
    }

    #[test]
    fn test_no_match_yields_zero_result() {
        let harness = Harness::start(1, SplitMode::Space);
        assert_eq!(harness.scan("dog bird 42", "cat"), PartialResult::default());
        assert_eq!(harness.scan("", "cat"), PartialResult::default());

        let stats = harness.shutdown();
        assert_eq!(stats[0].tasks, 2);
        assert_eq!(stats[0].acquisitions(), 0);
    }

    #[test]
    fn test_split_mode_changes_matches() {
        let space = Harness::start(1, SplitMode::Space);
        assert_eq!(
            space.scan("cat1\tcat2", "cat"),
            PartialResult { word_count: 1, digit_count: 2 }
        );
        space.shutdown();

        let whitespace = Harness::start(1, SplitMode::Whitespace);
        assert_eq!(
            whitespace.scan("cat1\tcat2", "cat"),
            PartialResult { word_count: 2, digit_count: 2 }
        );
        whitespace.shutdown();
    }

    #[test]
    fn test_empty_pattern_matches_every_token() {
        let harness = Harness::start(1, SplitMode::Space);
        assert_eq!(
            harness.scan("a1 b22 c", ""),
            PartialResult { word_count: 3, digit_count: 3 }
        );
        harness.shutdown();
    }

    #[test]
    fn test_many_workers_share_the_service() {
        let harness = Harness::start(4, SplitMode::Space);
        let main = harness.main.clone();

        for _ in 0..4 {
            harness
                .set
                .task_sender()
                .send(LineTask::new("cat1 cat2 cat3 dog", "cat").unwrap(), &main)
                .unwrap();
        }
        let mut words = 0;
        let mut digits = 0;
        for _ in 0..4 {
            let result = harness.set.result_receiver().recv(&main).unwrap();
            words += result.word_count;
            digits += result.digit_count;
        }
        assert_eq!((words, digits), (12, 12));

        let stats = harness.shutdown();
        assert_eq!(stats.iter().map(|s| s.tasks).sum::<u64>(), 4);
        assert_eq!(stats.iter().map(|s| s.acquisitions()).sum::<u64>(), 12);
    }

    #[test]
    fn test_think_time_is_cancellable() {
        let set = ChannelSet::create(1).unwrap();
        let stop = CancellationToken::new();
        let main = CancellationToken::new();

        let worker = Worker::new(0, set.worker_channels()).with_think_time(Some(Duration::from_secs(30)));
        let worker_stop = stop.clone();
        let handle = std::thread::spawn(move || worker.run(&worker_stop));

        // No matches, so the service is never needed
        set.task_sender().send(LineTask::new("dog", "cat").unwrap(), &main).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        stop.cancel();
        let stats = handle.join().unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(stats.tasks, 0);
        assert!(set.result_receiver().is_empty());
    }

    #[test]
    fn test_zero_think_time_is_ignored() {
        let set = ChannelSet::create(1).unwrap();
        let worker = Worker::new(3, set.worker_channels()).with_think_time(Some(Duration::ZERO));
        assert!(worker.think_time.is_none());
        assert_eq!(worker.label(), "worker-3");
        assert_eq!(worker.id(), 3);
    }
}
