//! wordscan - Concurrent prefix-word scanner
//!
//! wordscan distributes the lines of an input file to a pool of worker threads
//! that look for words starting with a literal pattern. Every matched word is
//! sent to a shared counting service that reports how many decimal digits it
//! contains. Access to that service is serialized by a single mutex token.
//!
//! # Architecture
//!
//! - **Channel set**: bounded line-task, result, word-request and digit-reply channels
//! - **Synchronization**: single-slot mutex token plus a capacity-1 request/reply rendezvous
//! - **Workers**: tokenize lines, match the prefix, call the counting service
//! - **Counting service**: answers one digit-count request at a time
//! - **Coordinator**: spawns everything, dispatches tasks, aggregates, tears down

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod counter;
pub mod input;
pub mod output;
pub mod protocol;
pub mod stats;
pub mod sync;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, RunOutcome};
pub use util::cancel::CancellationToken;

/// Result type used throughout wordscan
pub type Result<T> = anyhow::Result<T>;
