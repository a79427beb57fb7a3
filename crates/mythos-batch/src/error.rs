use std::time::Duration;

use mythos_ai::AiError;
use thiserror::Error;

use crate::task::TaskStatus;

/// Why a single task ended in `error`. The `Display` text is what the task
/// shows; collaborator messages pass through untouched.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Image generated but saving failed: {0}")]
    Save(String),

    #[error("Prompt repair failed: {0}")]
    RepairFailed(String),
}

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Storage quota exceeded ({needed} bytes needed, {quota} allowed)")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Misuse of the batch processor API.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No task at index {0}")]
    NoSuchTask(usize),

    #[error("Task {0} would have an empty prompt")]
    EmptyPrompt(usize),

    #[error("Task {index} is {status}, expected {expected}")]
    InvalidState {
        index: usize,
        status: TaskStatus,
        expected: &'static str,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] KvError),
}
