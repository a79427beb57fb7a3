use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::parse::ParsedLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Picked up by "retry all".
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What a successful task produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub creation_id: Uuid,
    pub name: String,
    pub image_id: Option<Uuid>,
    /// Data URI kept for display; dropped when the cache is short on space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// One line of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTask {
    pub prompt: String,
    /// Per-line override of the batch default culture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchTask {
    pub fn new(line: ParsedLine) -> Self {
        Self {
            prompt: line.prompt,
            culture: line.culture,
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn culture_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.culture.as_deref().unwrap_or(default)
    }
}

/// Live progress of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Tasks finished in this run.
    pub current: usize,
    pub total: usize,
    pub running: bool,
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStatus {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub error: usize,
}

impl BatchStatus {
    pub fn of(tasks: &[BatchTask]) -> Self {
        let mut status = Self {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Pending => status.pending += 1,
                TaskStatus::Processing => status.processing += 1,
                TaskStatus::Success => status.success += 1,
                TaskStatus::Error => status.error += 1,
            }
        }
        status
    }
}
