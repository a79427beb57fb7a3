//! Sequential batch processor.
//!
//! Tasks run strictly one at a time in input order. Cancellation is a
//! shared flag checked before each task starts; a task already in flight
//! finishes (or times out) normally and the rest stay `pending`. State is
//! written to the [`BatchCache`] after every transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mythos_ai::Collaborators;
use mythos_shared::GenerationSettings;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{BatchCache, PersistedBatch, SaveOutcome};
use crate::error::{BatchError, TaskError};
use crate::parse::{parse_batch, parse_line};
use crate::runner::{process_single_prompt, CreationSink, TaskContext};
use crate::task::{BatchStatus, BatchTask, Progress, TaskStatus};

pub struct BatchProcessor {
    collaborators: Collaborators,
    sink: Arc<dyn CreationSink>,
    cache: BatchCache,
    timeout: Duration,
    settings: GenerationSettings,
    tasks: Vec<BatchTask>,
    prompts: String,
    cancel: Arc<AtomicBool>,
    progress: watch::Sender<Progress>,
    storage_warning: Option<String>,
}

impl BatchProcessor {
    pub fn new(
        collaborators: Collaborators,
        sink: Arc<dyn CreationSink>,
        cache: BatchCache,
        timeout: Duration,
    ) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            collaborators,
            sink,
            cache,
            timeout,
            settings: GenerationSettings::default(),
            tasks: Vec::new(),
            prompts: String::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            progress,
            storage_warning: None,
        }
    }

    /// Reload a previously cached batch. Returns `false` when there is none.
    pub fn restore(&mut self) -> Result<bool, BatchError> {
        let Some(saved) = self.cache.load()? else {
            return Ok(false);
        };
        self.tasks = saved.results;
        self.prompts = saved.prompts;
        if let Some(settings) = saved.settings {
            self.settings = settings;
        }
        info!(tasks = self.tasks.len(), "batch restored from cache");
        Ok(true)
    }

    /// Replace the current batch with the lines of `text`.
    pub fn submit(&mut self, text: &str, settings: GenerationSettings) -> usize {
        self.tasks = parse_batch(text).into_iter().map(BatchTask::new).collect();
        self.prompts = text.to_string();
        self.settings = settings;
        self.persist();
        info!(tasks = self.tasks.len(), "batch submitted");
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[BatchTask] {
        &self.tasks
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn prompts(&self) -> &str {
        &self.prompts
    }

    pub fn status(&self) -> BatchStatus {
        BatchStatus::of(&self.tasks)
    }

    /// Set when the last save failed or had to drop image payloads.
    pub fn storage_warning(&self) -> Option<&str> {
        self.storage_warning.as_deref()
    }

    /// Shared flag; setting it stops the current run before the next task.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Run every `pending` task in order.
    pub async fn run(&mut self) -> BatchStatus {
        let indices = self.indices_where(|s| s == TaskStatus::Pending);
        self.run_sequence(indices).await
    }

    /// Re-run every `pending` or `error` task in order.
    pub async fn retry_all(&mut self) -> BatchStatus {
        let indices = self.indices_where(|s| s.is_retryable());
        self.run_sequence(indices).await
    }

    fn indices_where(&self, keep: impl Fn(TaskStatus) -> bool) -> Vec<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| keep(t.status))
            .map(|(i, _)| i)
            .collect()
    }

    async fn run_sequence(&mut self, indices: Vec<usize>) -> BatchStatus {
        self.cancel.store(false, Ordering::SeqCst);
        let total = indices.len();
        self.progress.send_replace(Progress {
            current: 0,
            total,
            running: true,
        });
        info!(total, "batch run started");

        for (done, index) in indices.into_iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                info!(done, total, "batch run cancelled");
                break;
            }
            self.process(index).await;
            self.progress.send_modify(|p| p.current = done + 1);
        }

        self.progress.send_modify(|p| p.running = false);
        let status = self.status();
        info!(
            success = status.success,
            error = status.error,
            pending = status.pending,
            "batch run finished"
        );
        status
    }

    async fn process(&mut self, index: usize) -> TaskStatus {
        let (prompt, culture) = {
            let task = &mut self.tasks[index];
            task.status = TaskStatus::Processing;
            task.error = None;
            task.result = None;
            let culture = task.culture_or(&self.settings.default_culture).to_string();
            (task.prompt.clone(), culture)
        };
        self.persist();
        debug!(index, %culture, "task processing");

        let outcome = {
            let ctx = TaskContext {
                collaborators: &self.collaborators,
                sink: self.sink.as_ref(),
                settings: &self.settings,
                timeout: self.timeout,
            };
            process_single_prompt(&ctx, &prompt, &culture).await
        };

        let task = &mut self.tasks[index];
        match outcome {
            Ok(result) => {
                info!(index, name = %result.name, "task succeeded");
                task.status = TaskStatus::Success;
                task.result = Some(result);
            }
            Err(e) => {
                warn!(index, error = %e, "task failed");
                task.status = TaskStatus::Error;
                task.error = Some(e.to_string());
            }
        }
        let status = task.status;
        self.persist();
        status
    }

    // -----------------------------------------------------------------------
    // Per-task remediation
    // -----------------------------------------------------------------------

    /// Re-run a failed task unchanged.
    pub async fn retry(&mut self, index: usize) -> Result<TaskStatus, BatchError> {
        self.require(index, TaskStatus::Error)?;
        Ok(self.process(index).await)
    }

    /// Replace a failed task's text (re-parsing any culture prefix) and
    /// re-run it.
    pub async fn edit_and_retry(&mut self, index: usize, text: &str) -> Result<TaskStatus, BatchError> {
        self.require(index, TaskStatus::Error)?;
        let line = parse_line(text);
        if line.prompt.is_empty() {
            return Err(BatchError::EmptyPrompt(index));
        }

        let task = &mut self.tasks[index];
        task.prompt = line.prompt;
        task.culture = line.culture;
        task.status = TaskStatus::Pending;
        task.error = None;
        self.persist();
        debug!(index, "task edited");

        Ok(self.process(index).await)
    }

    /// Ask the text collaborator to rewrite a failed prompt, then re-run
    /// it. When the rewrite fails the task stays in `error` with a repair
    /// message and its prompt is left as it was.
    pub async fn repair_and_retry(&mut self, index: usize) -> Result<TaskStatus, BatchError> {
        self.require(index, TaskStatus::Error)?;
        let prompt = self.tasks[index].prompt.clone();

        let repaired = match self.collaborators.text.fix_prompt(&prompt).await {
            Ok(fixed) if fixed.trim().is_empty() => {
                Err(TaskError::RepairFailed("empty rewrite".into()))
            }
            Ok(fixed) => Ok(fixed),
            Err(e) => Err(TaskError::RepairFailed(e.to_string())),
        };

        match repaired {
            Ok(fixed) => {
                info!(index, "prompt repaired");
                self.tasks[index].prompt = fixed;
                Ok(self.process(index).await)
            }
            Err(err) => {
                warn!(index, error = %err, "prompt repair failed");
                self.tasks[index].error = Some(err.to_string());
                self.persist();
                Ok(TaskStatus::Error)
            }
        }
    }

    /// Remove a successful task from the list. The saved creation stays.
    pub fn prune(&mut self, index: usize) -> Result<BatchTask, BatchError> {
        self.require(index, TaskStatus::Success)?;
        let task = self.tasks.remove(index);
        self.persist();
        Ok(task)
    }

    /// Drop the batch from memory and from the cache.
    pub fn clear(&mut self) -> Result<(), BatchError> {
        self.tasks.clear();
        self.prompts.clear();
        self.storage_warning = None;
        self.progress.send_replace(Progress::default());
        self.cache.clear()?;
        info!("batch cleared");
        Ok(())
    }

    fn require(&self, index: usize, expected: TaskStatus) -> Result<(), BatchError> {
        let task = self.tasks.get(index).ok_or(BatchError::NoSuchTask(index))?;
        if task.status != expected {
            return Err(BatchError::InvalidState {
                index,
                status: task.status,
                expected: expected.as_str(),
            });
        }
        Ok(())
    }

    fn persist(&mut self) {
        let snapshot = PersistedBatch {
            results: self.tasks.clone(),
            prompts: self.prompts.clone(),
            settings: Some(self.settings.clone()),
        };
        self.storage_warning = match self.cache.save(&snapshot) {
            Ok(SaveOutcome::Full) => None,
            Ok(SaveOutcome::Reduced) => {
                Some("Storage is nearly full; images were left out of the saved batch.".into())
            }
            Err(e) => {
                warn!(error = %e, "batch state not saved");
                Some(format!("Batch progress could not be saved: {e}"))
            }
        };
    }
}
