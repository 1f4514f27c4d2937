//! Coordinator
//!
//! Owns one run from start to finish:
//!
//! ```text
//! INIT → CHANNELS_READY → PROCESSES_SPAWNED → DISPATCHING → COLLECTING → REPORTING → TERMINATED
//!   └──────────────── shutdown or fatal error ─────────────→ TERMINATING ─┘
//! ```
//!
//! The channel set is created first; if that fails nothing else has happened
//! and the run aborts. Counting services and workers are spawned next and
//! recorded in the [`ProcessRegistry`]. Every line chunk of the input becomes
//! one [`LineTask`]; the coordinator then waits for exactly one partial result
//! per task and sums them.
//!
//! Teardown is the same on every path that got past channel creation:
//! terminate every live process, release the channel set, discard the
//! registry. A shutdown request produces a teardown report and no aggregate.
//! A callback registered with [`Coordinator::on_teardown`] sees each
//! termination notice as its process is joined, then the channel release.
//!
//! Shutdown is checked before the first spawn and between spawns, so an
//! early interrupt never starts the whole pool.
//!
//! While the line-task channel is full, the coordinator accepts results that
//! are already waiting. Both channels are sized to the worker count, and a
//! coordinator that only sends would otherwise deadlock against workers
//! blocked on a full result channel.

pub mod registry;

use crate::channel::{ChannelError, ChannelName, ChannelSet};
use crate::config::Config;
use crate::counter::CountingService;
use crate::input::LineSource;
use crate::protocol::{BoundedText, LineTask, MessageError};
use crate::stats::aggregator::{AggregateResult, ResultAggregator};
use crate::stats::{ServiceStats, WorkerStats};
use crate::util::cancel::CancellationToken;
use crate::worker::Worker;
use registry::{ProcessOutcome, ProcessRegistry, ProcessRole, TerminationNotice};
#[cfg(test)]
use crate::channel::ChannelObserver;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lifecycle state of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Init,
    ChannelsReady,
    ProcessesSpawned,
    Dispatching,
    Collecting,
    Reporting,
    Terminating,
    Terminated,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinatorState::Init => "INIT",
            CoordinatorState::ChannelsReady => "CHANNELS_READY",
            CoordinatorState::ProcessesSpawned => "PROCESSES_SPAWNED",
            CoordinatorState::Dispatching => "DISPATCHING",
            CoordinatorState::Collecting => "COLLECTING",
            CoordinatorState::Reporting => "REPORTING",
            CoordinatorState::Terminating => "TERMINATING",
            CoordinatorState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Fatal coordinator errors
///
/// Every variant except `ChannelSetup`, `MissingPattern`, `Pattern` and
/// `AlreadyStarted` is raised after channels exist; any spawned processes
/// are terminated and the channels released before the error is returned.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("run already started (state {0})")]
    AlreadyStarted(CoordinatorState),

    #[error("no pattern configured")]
    MissingPattern,

    #[error("invalid pattern: {0}")]
    Pattern(#[source] MessageError),

    #[error("failed to create channels: {0}")]
    ChannelSetup(#[source] ChannelError),

    #[error("failed to spawn {label}: {source}")]
    Spawn {
        label: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open input {}: {source}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read input {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("task {task} cannot be built: {source}")]
    Task {
        task: u64,
        #[source]
        source: MessageError,
    },

    #[error("coordinator channel failure: {0}")]
    Channel(#[source] ChannelError),
}

/// What teardown did
#[derive(Debug, Clone)]
pub struct TeardownReport {
    /// One notice per process, in spawn order
    pub notices: Vec<TerminationNotice>,
    /// Channels released, in creation order
    pub channels_released: Vec<ChannelName>,
}

impl TeardownReport {
    /// Worker statistics merged across every worker that exited cleanly
    pub fn worker_stats(&self) -> WorkerStats {
        let mut merged = WorkerStats::new();
        for notice in &self.notices {
            if let ProcessOutcome::Worker(stats) = &notice.outcome {
                if let Err(e) = merged.merge(stats) {
                    tracing::warn!(label = %notice.label, error = %e, "worker statistics not merged");
                }
            }
        }
        merged
    }

    /// Counting service statistics summed across every service
    pub fn service_stats(&self) -> ServiceStats {
        let mut merged = ServiceStats::default();
        for notice in &self.notices {
            if let ProcessOutcome::CountingService(stats) = &notice.outcome {
                merged.merge(stats);
            }
        }
        merged
    }

    /// Processes that failed or panicked
    pub fn failures(&self) -> usize {
        self.notices.iter().filter(|n| n.outcome.is_failure()).count()
    }
}

/// Report of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub aggregate: AggregateResult,
    pub tasks_dispatched: u64,
    pub lines_read: u64,
    pub workers: usize,
    pub counting_services: usize,
    /// From channel creation to the last partial result
    pub elapsed: Duration,
    pub teardown: TeardownReport,
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Shutdown was requested; no aggregate is reported
    Cancelled(TeardownReport),
}

/// Teardown progress, reported while it happens
#[derive(Debug, Clone, Copy)]
pub enum TeardownEvent<'a> {
    /// One process has been joined
    Terminated(&'a TerminationNotice),
    /// The channel set has been released
    Released(&'a [ChannelName]),
}

type TeardownHook = Box<dyn FnMut(TeardownEvent<'_>)>;

/// Result of dispatch and collection, before teardown
struct Collected {
    aggregate: AggregateResult,
    tasks_dispatched: u64,
    lines_read: u64,
    elapsed: Duration,
}

/// Run orchestrator
pub struct Coordinator {
    config: Arc<Config>,
    shutdown: CancellationToken,
    state: CoordinatorState,
    registry: ProcessRegistry,
    on_teardown: Option<TeardownHook>,
    #[cfg(test)]
    observer: Option<ChannelObserver>,
}

impl Coordinator {
    /// Create a coordinator; `shutdown` is the external cancellation request
    pub fn new(config: Arc<Config>, shutdown: CancellationToken) -> Self {
        Self::with_registry(config, shutdown, ProcessRegistry::new())
    }

    fn with_registry(config: Arc<Config>, shutdown: CancellationToken, registry: ProcessRegistry) -> Self {
        Self {
            config,
            shutdown,
            state: CoordinatorState::Init,
            registry,
            on_teardown: None,
            #[cfg(test)]
            observer: None,
        }
    }

    /// Report teardown progress to `hook` as it happens
    ///
    /// # Arguments
    ///
    /// * `hook` - Called once per joined process, in spawn order, and once
    ///   more after the channel set has been released
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use wordscan::coordinator::TeardownEvent;
    /// use wordscan::{CancellationToken, Config, Coordinator};
    ///
    /// let config = Arc::new(Config::default());
    /// let coordinator = Coordinator::new(config, CancellationToken::new()).on_teardown(|event| {
    ///     if let TeardownEvent::Terminated(notice) = event {
    ///         println!("{} stopped", notice.label);
    ///     }
    /// });
    /// ```
    pub fn on_teardown(mut self, hook: impl FnMut(TeardownEvent<'_>) + 'static) -> Self {
        self.on_teardown = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Processes spawned and not yet confirmed terminated
    pub fn live_processes(&self) -> usize {
        self.registry.live_count()
    }

    /// Execute one run
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. By the time it is returned every
    /// spawned process has been terminated and the channels released.
    pub fn run(&mut self) -> Result<RunOutcome, CoordinatorError> {
        if self.state != CoordinatorState::Init {
            return Err(CoordinatorError::AlreadyStarted(self.state));
        }

        match self.config.scan.pattern.as_deref() {
            Some(pattern) => {
                BoundedText::new("pattern", pattern).map_err(CoordinatorError::Pattern)?;
            }
            None => return Err(CoordinatorError::MissingPattern),
        }

        let started = Instant::now();
        let channels = ChannelSet::create(self.config.workers.count).map_err(|e| {
            self.state = CoordinatorState::Terminated;
            CoordinatorError::ChannelSetup(e)
        })?;
        self.transition(CoordinatorState::ChannelsReady);

        #[cfg(test)]
        {
            self.observer = Some(channels.observer());
        }

        let result = self.execute(&channels, started);
        if !matches!(result, Ok(Some(_))) {
            self.transition(CoordinatorState::Terminating);
        }

        let teardown = self.teardown(channels);

        match result {
            Ok(Some(collected)) => Ok(RunOutcome::Completed(RunReport {
                aggregate: collected.aggregate,
                tasks_dispatched: collected.tasks_dispatched,
                lines_read: collected.lines_read,
                workers: self.config.workers.count,
                counting_services: self.config.counting.pool_size,
                elapsed: collected.elapsed,
                teardown,
            })),
            Ok(None) => {
                tracing::info!("run cancelled, no aggregate reported");
                Ok(RunOutcome::Cancelled(teardown))
            }
            Err(e) => Err(e),
        }
    }

    /// Spawn, dispatch, collect. Ok(None) means shutdown was requested.
    fn execute(&mut self, channels: &ChannelSet, started: Instant) -> Result<Option<Collected>, CoordinatorError> {
        if !self.spawn_processes(channels)? {
            tracing::info!(
                spawned = self.registry.live_count(),
                "shutdown requested while spawning processes"
            );
            return Ok(None);
        }
        self.transition(CoordinatorState::ProcessesSpawned);

        tracing::info!(
            "{} worker processes created",
            self.registry.count(ProcessRole::Worker)
        );
        tracing::info!(
            "{} counting service processes created",
            self.registry.count(ProcessRole::CountingService)
        );

        if self.shutdown.is_cancelled() {
            return Ok(None);
        }

        let config = Arc::clone(&self.config);
        let path = &config.scan.source;
        let mut source = LineSource::open(path).map_err(|source| CoordinatorError::InputOpen {
            path: path.clone(),
            source,
        })?;

        self.transition(CoordinatorState::Dispatching);

        let pattern = config.scan.pattern();
        let tasks = channels.task_sender();
        let results = channels.result_receiver();
        let mut aggregator = ResultAggregator::new();
        let mut dispatched: u64 = 0;

        for chunk in source.by_ref() {
            let text = chunk.map_err(|source| CoordinatorError::InputRead {
                path: path.clone(),
                source,
            })?;
            let task = LineTask::new(text, pattern).map_err(|source| CoordinatorError::Task {
                task: dispatched + 1,
                source,
            })?;

            match tasks.send_draining(task, results, &self.shutdown, |r| aggregator.absorb(r)) {
                Ok(()) => dispatched += 1,
                Err(e) if e.is_cancelled() => return Ok(None),
                Err(e) => return Err(CoordinatorError::Channel(e)),
            }
        }

        tracing::debug!(
            dispatched,
            received = aggregator.received(),
            "dispatch complete"
        );
        self.transition(CoordinatorState::Collecting);

        while !aggregator.is_complete(dispatched) {
            match results.recv(&self.shutdown) {
                Ok(result) => aggregator.absorb(result),
                Err(e) if e.is_cancelled() => return Ok(None),
                Err(e) => return Err(CoordinatorError::Channel(e)),
            }
        }

        let elapsed = started.elapsed();
        self.transition(CoordinatorState::Reporting);

        let aggregate = aggregator.finish();
        tracing::info!("{} words -- {} digits", aggregate.word_count, aggregate.digit_count);

        Ok(Some(Collected {
            aggregate,
            tasks_dispatched: dispatched,
            lines_read: source.lines_read(),
            elapsed,
        }))
    }

    /// Counting services first, so no worker ever calls into an empty pool
    ///
    /// Returns false when shutdown was requested before every process was
    /// started. Whatever was spawned up to then stays in the registry.
    fn spawn_processes(&mut self, channels: &ChannelSet) -> Result<bool, CoordinatorError> {
        for id in 0..self.config.counting.pool_size {
            if self.shutdown.is_cancelled() {
                return Ok(false);
            }
            let label = format!("counter-{}", id);
            let service = CountingService::new(id, channels.counting_endpoint());

            self.registry
                .spawn(ProcessRole::CountingService, label.as_str(), move |cancel| {
                    match service.run(&cancel) {
                        Ok(stats) => ProcessOutcome::CountingService(stats),
                        Err(e) => ProcessOutcome::Failed(e.to_string()),
                    }
                })
                .map_err(|source| CoordinatorError::Spawn { label, source })?;
        }

        let split = self.config.scan.split;
        let think_time = self.config.workers.think_time();

        for id in 0..self.config.workers.count {
            if self.shutdown.is_cancelled() {
                return Ok(false);
            }
            let worker = Worker::new(id, channels.worker_channels())
                .with_split(split)
                .with_think_time(think_time);
            let label = worker.label().to_string();

            self.registry
                .spawn(ProcessRole::Worker, label.as_str(), move |cancel| match worker.run(&cancel) {
                    Ok(stats) => ProcessOutcome::Worker(stats),
                    Err(e) => ProcessOutcome::Failed(e.to_string()),
                })
                .map_err(|source| CoordinatorError::Spawn { label, source })?;
        }

        Ok(true)
    }

    /// Terminate every live process, release the channels, discard the registry
    fn teardown(&mut self, channels: ChannelSet) -> TeardownReport {
        let mut hook = self.on_teardown.take();

        let notices = self.registry.terminate_all_with(|notice| {
            tracing::debug!(
                role = %notice.role,
                label = %notice.label,
                outcome = %notice.outcome,
                "process terminated"
            );
            emit(&mut hook, TeardownEvent::Terminated(notice));
        });

        let channels_released = channels.release();
        self.registry.discard();
        tracing::debug!(channels = channels_released.len(), "resources released");
        emit(&mut hook, TeardownEvent::Released(&channels_released));

        self.transition(CoordinatorState::Terminated);
        TeardownReport {
            notices,
            channels_released,
        }
    }

    fn transition(&mut self, next: CoordinatorState) {
        tracing::debug!(from = %self.state, to = %next, "coordinator state");
        self.state = next;
    }
}

fn emit(hook: &mut Option<TeardownHook>, event: TeardownEvent<'_>) {
    if let Some(hook) = hook {
        hook(event);
    }
}
