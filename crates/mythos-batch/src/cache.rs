//! Resumable batch cache.
//!
//! A small quota-limited key-value store holds the batch state as JSON
//! (`{results, prompts}`) after every state change, so an interrupted
//! process can pick up where it stopped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mythos_shared::GenerationSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::KvError;
use crate::task::{BatchTask, TaskStatus};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;
    fn remove(&self, key: &str) -> Result<(), KvError>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// One `<key>.json` file per entry under a directory.
pub struct FileKvStore {
    dir: PathBuf,
    quota_bytes: usize,
}

impl FileKvStore {
    pub fn open(dir: &Path, quota_bytes: usize) -> Result<Self, KvError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            quota_bytes,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }

    /// Bytes used by every entry except `skip`.
    fn used_bytes(&self, skip: &Path) -> Result<usize, KvError> {
        let mut used = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path() == skip {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_file() {
                used += meta.len() as usize;
            }
        }
        Ok(used)
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let path = self.path_for(key);
        let needed = self.used_bytes(&path)? + value.len();
        if needed > self.quota_bytes {
            return Err(KvError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKvStore {
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > quota {
                return Err(KvError::QuotaExceeded { needed, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Batch state
// ---------------------------------------------------------------------------

/// Serialized form of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBatch {
    pub results: Vec<BatchTask>,
    /// Raw submission text.
    pub prompts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<GenerationSettings>,
}

impl PersistedBatch {
    /// Copy without image payloads.
    fn reduced(&self) -> Self {
        let mut reduced = self.clone();
        for task in &mut reduced.results {
            if let Some(result) = &mut task.result {
                result.image_url = None;
            }
        }
        reduced
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Full,
    /// Saved without image payloads.
    Reduced,
}

/// Typed access to the batch entry of a [`KeyValueStore`].
#[derive(Clone)]
pub struct BatchCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl BatchCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Load the saved batch. Tasks left in `processing` by an interrupted
    /// run come back as `pending`. Unreadable entries are logged and ignored.
    pub fn load(&self) -> Result<Option<PersistedBatch>, KvError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };

        let mut batch: PersistedBatch = match serde_json::from_str(&raw) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unreadable batch cache");
                return Ok(None);
            }
        };

        for task in &mut batch.results {
            if task.status == TaskStatus::Processing {
                task.status = TaskStatus::Pending;
            }
        }
        debug!(tasks = batch.results.len(), "batch cache loaded");
        Ok(Some(batch))
    }

    /// Save the batch, retrying without image payloads when the full
    /// payload does not fit.
    pub fn save(&self, batch: &PersistedBatch) -> Result<SaveOutcome, KvError> {
        let full = serde_json::to_string(batch)?;
        match self.store.set(&self.key, &full) {
            Ok(()) => Ok(SaveOutcome::Full),
            Err(KvError::QuotaExceeded { needed, quota }) => {
                warn!(needed, quota, "batch cache over quota, saving reduced state");
                let reduced = serde_json::to_string(&batch.reduced())?;
                self.store.set(&self.key, &reduced)?;
                Ok(SaveOutcome::Reduced)
            }
            Err(e) => Err(e),
        }
    }

    pub fn clear(&self) -> Result<(), KvError> {
        self.store.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskResult;
    use uuid::Uuid;

    fn task(prompt: &str, status: TaskStatus) -> BatchTask {
        BatchTask {
            prompt: prompt.into(),
            culture: None,
            status,
            result: None,
            error: None,
        }
    }

    #[test]
    fn processing_comes_back_pending() {
        let cache = BatchCache::new(Arc::new(MemoryKvStore::default()), "k");
        let batch = PersistedBatch {
            results: vec![
                task("a", TaskStatus::Success),
                task("b", TaskStatus::Error),
                task("c", TaskStatus::Processing),
                task("d", TaskStatus::Pending),
            ],
            prompts: "a\nb\nc\nd".into(),
            settings: None,
        };
        cache.save(&batch).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        let statuses: Vec<_> = loaded.results.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                TaskStatus::Success,
                TaskStatus::Error,
                TaskStatus::Pending,
                TaskStatus::Pending
            ]
        );
        assert_eq!(loaded.prompts, batch.prompts);
    }

    #[test]
    fn over_quota_saves_reduced_payload() {
        let cache = BatchCache::new(Arc::new(MemoryKvStore::with_quota(400)), "k");
        let mut done = task("Zeus", TaskStatus::Success);
        done.result = Some(TaskResult {
            creation_id: Uuid::new_v4(),
            name: "Zeus".into(),
            image_id: Some(Uuid::new_v4()),
            image_url: Some(format!("data:image/png;base64,{}", "A".repeat(1000))),
        });
        let batch = PersistedBatch {
            results: vec![done],
            prompts: "Zeus".into(),
            settings: None,
        };

        assert_eq!(cache.save(&batch).unwrap(), SaveOutcome::Reduced);
        let loaded = cache.load().unwrap().unwrap();
        let result = loaded.results[0].result.as_ref().unwrap();
        assert!(result.image_url.is_none());
        assert_eq!(loaded.results[0].status, TaskStatus::Success);
    }

    #[test]
    fn hopeless_payload_is_an_error() {
        let cache = BatchCache::new(Arc::new(MemoryKvStore::with_quota(10)), "k");
        let batch = PersistedBatch {
            results: vec![task("a very long prompt", TaskStatus::Pending)],
            prompts: "a very long prompt".into(),
            settings: None,
        };
        assert!(matches!(cache.save(&batch), Err(KvError::QuotaExceeded { .. })));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path(), 1024).unwrap();
        store.set("batch-processor-state", "{}").unwrap();
        assert_eq!(store.get("batch-processor-state").unwrap().as_deref(), Some("{}"));

        let reopened = FileKvStore::open(dir.path(), 1024).unwrap();
        assert!(reopened.get("batch-processor-state").unwrap().is_some());

        // overwriting an entry does not count its old size
        reopened.set("batch-processor-state", &"x".repeat(1000)).unwrap();
        assert!(matches!(
            reopened.set("other", &"y".repeat(100)),
            Err(KvError::QuotaExceeded { .. })
        ));

        reopened.remove("batch-processor-state").unwrap();
        reopened.remove("batch-processor-state").unwrap();
        assert!(reopened.get("batch-processor-state").unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_ignored() {
        let store = Arc::new(MemoryKvStore::default());
        store.set("k", "not json").unwrap();
        let cache = BatchCache::new(store, "k");
        assert!(cache.load().unwrap().is_none());
    }
}
