//! Process registry
//!
//! The coordinator's record of every process it spawned. Each record owns
//! the join handle of its thread and the cancellation token that serves as
//! that process's termination directive. Termination is always directed:
//! the registry cancels each record's own token, never a shared one.
//!
//! A record's handle is cleared once its thread has been joined, so
//! [`ProcessRegistry::live_count`] only counts processes whose termination
//! has not been confirmed yet.
//!
//! Threads are started through a [`Spawner`]. [`ThreadSpawner`] is the only
//! production implementation; other implementations exist to make spawn
//! failures reproducible.

use crate::stats::{ServiceStats, WorkerStats};
use crate::util::cancel::CancellationToken;
use serde::Serialize;
use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};

/// What a spawned process does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessRole {
    Worker,
    CountingService,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Worker => write!(f, "worker"),
            ProcessRole::CountingService => write!(f, "counting service"),
        }
    }
}

/// Value a process thread hands back when it exits
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Worker(WorkerStats),
    CountingService(ServiceStats),
    /// The loop ended on an error other than cancellation
    Failed(String),
    Panicked,
}

impl ProcessOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ProcessOutcome::Failed(_) | ProcessOutcome::Panicked)
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Worker(_) | ProcessOutcome::CountingService(_) => write!(f, "stopped"),
            ProcessOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            ProcessOutcome::Panicked => write!(f, "panicked"),
        }
    }
}

/// Confirmation that one process has terminated
#[derive(Debug, Clone)]
pub struct TerminationNotice {
    pub role: ProcessRole,
    pub label: String,
    pub outcome: ProcessOutcome,
}

/// Body of a process thread, already bound to its cancellation token
pub type ProcessBody = Box<dyn FnOnce() -> ProcessOutcome + Send + 'static>;

/// Starts the thread behind one process
pub trait Spawner {
    /// Start `body` on a new thread named `label`
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be created. `body` has
    /// not run in that case.
    fn spawn(&mut self, label: &str, body: ProcessBody) -> io::Result<JoinHandle<ProcessOutcome>>;
}

/// Named OS threads via `std::thread::Builder`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&mut self, label: &str, body: ProcessBody) -> io::Result<JoinHandle<ProcessOutcome>> {
        thread::Builder::new().name(label.to_string()).spawn(body)
    }
}

/// One spawned process
#[derive(Debug)]
pub struct ProcessRecord {
    role: ProcessRole,
    label: String,
    handle: Option<JoinHandle<ProcessOutcome>>,
    cancel: CancellationToken,
}

impl ProcessRecord {
    /// Whether termination of this process has not been confirmed yet
    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancel and join; None if already terminated
    fn terminate(&mut self) -> Option<TerminationNotice> {
        let handle = self.handle.take()?;
        self.cancel.cancel();

        let outcome = handle.join().unwrap_or(ProcessOutcome::Panicked);
        Some(TerminationNotice {
            role: self.role,
            label: self.label.clone(),
            outcome,
        })
    }
}

/// Registry of every process spawned by a coordinator
pub struct ProcessRegistry {
    records: Vec<ProcessRecord>,
    spawner: Box<dyn Spawner>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::with_spawner(Box::new(ThreadSpawner))
    }

    /// Registry starting its threads through `spawner`
    pub fn with_spawner(spawner: Box<dyn Spawner>) -> Self {
        Self {
            records: Vec::new(),
            spawner,
        }
    }

    /// Spawn a named thread running `body` and record it
    ///
    /// `body` receives the process's own cancellation token. On failure
    /// nothing is recorded.
    pub fn spawn<F>(&mut self, role: ProcessRole, label: impl Into<String>, body: F) -> io::Result<()>
    where
        F: FnOnce(CancellationToken) -> ProcessOutcome + Send + 'static,
    {
        let label = label.into();
        let cancel = CancellationToken::new();
        let process_cancel = cancel.clone();

        let handle = self
            .spawner
            .spawn(&label, Box::new(move || body(process_cancel)))?;

        tracing::debug!(role = %role, label = %label, "process spawned");
        self.records.push(ProcessRecord {
            role,
            label,
            handle: Some(handle),
            cancel,
        });
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    /// Processes whose termination has not been confirmed
    pub fn live_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_live()).count()
    }

    /// Recorded processes with the given role, live or not
    pub fn count(&self, role: ProcessRole) -> usize {
        self.records.iter().filter(|r| r.role == role).count()
    }

    /// Terminate every live process
    pub fn terminate_all(&mut self) -> Vec<TerminationNotice> {
        self.terminate_all_with(|_| {})
    }

    /// Terminate every live process, reporting each one as it is joined
    ///
    /// All termination directives are issued before the first join, so the
    /// processes wind down concurrently. `on_notice` sees each notice right
    /// after its thread has been joined; notices come in spawn order.
    pub fn terminate_all_with(&mut self, mut on_notice: impl FnMut(&TerminationNotice)) -> Vec<TerminationNotice> {
        for record in self.records.iter().filter(|r| r.is_live()) {
            tracing::debug!(role = %record.role, label = %record.label, "terminating process");
            record.cancel.cancel();
        }

        let mut notices = Vec::new();
        for record in self.records.iter_mut() {
            if let Some(notice) = record.terminate() {
                on_notice(&notice);
                notices.push(notice);
            }
        }
        notices
    }

    /// Drop every record; live processes are terminated first
    pub fn discard(&mut self) {
        if self.live_count() > 0 {
            self.terminate_all();
        }
        self.records.clear();
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("records", &self.records)
            .finish()
    }
}

impl Drop for ProcessRegistry {
    fn drop(&mut self) {
        if self.live_count() > 0 {
            tracing::warn!(live = self.live_count(), "registry dropped with live processes");
            self.terminate_all();
        }
    }
}
