/// Application name
pub const APP_NAME: &str = "Mythos";

/// Culture applied to batch lines that carry no `culture;` prefix.
pub const DEFAULT_CULTURE: &str = "Griega";

/// Hard timeout for one batch task, in seconds.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 60;

/// Key under which the batch pipeline persists its resumable state.
pub const BATCH_STATE_KEY: &str = "batch-processor-state";

/// Default quota for the key-value cache (5 MiB, like browser local storage).
pub const DEFAULT_CACHE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Accepted batch header labels, per supported language.
/// The first line of a batch is dropped when it is `<culture><sep><prompt>`.
pub const HEADER_CULTURE_LABELS: &[&str] = &["culture", "cultura"];
pub const HEADER_PROMPT_LABELS: &[&str] = &["prompt", "descripción", "descripcion"];

/// Number of leading prompt words used when entity extraction fails.
pub const FALLBACK_ENTITY_WORDS: usize = 5;
/// Number of leading prompt words used as a fallback creation name.
pub const FALLBACK_NAME_WORDS: usize = 3;

/// Archive manifest file name and image directory.
pub const ARCHIVE_MANIFEST: &str = "data.json";
pub const ARCHIVE_IMAGE_DIR: &str = "images/";

/// Archive manifest format version written on export.
pub const ARCHIVE_VERSION: u32 = 1;
