//! # mythos-batch
//!
//! Batch pipeline: turns a block of prompt lines into creations, one task
//! at a time, with per-task timeout, cancellation, a resumable cache and
//! retry / edit / AI-repair remediation for failed tasks.

pub mod cache;
pub mod parse;
pub mod pipeline;
pub mod runner;
pub mod task;

mod error;

#[cfg(test)]
mod testing;

pub use cache::{BatchCache, FileKvStore, KeyValueStore, MemoryKvStore, PersistedBatch, SaveOutcome};
pub use error::{BatchError, KvError, TaskError};
pub use parse::{parse_batch, parse_line, ParsedLine};
pub use pipeline::BatchProcessor;
pub use runner::{process_single_prompt, CreationSink, TaskContext};
pub use task::{BatchStatus, BatchTask, Progress, TaskResult, TaskStatus};
