//! Application configuration loaded from environment variables.
//!
//! All settings have defaults so the tool runs with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use mythos_shared::constants::{DEFAULT_CACHE_QUOTA_BYTES, DEFAULT_CULTURE, DEFAULT_TASK_TIMEOUT_SECS};

#[derive(Clone)]
pub struct AppConfig {
    /// Holds `mythos.db` and the `cache/` directory.
    /// Env: `MYTHOS_DATA_DIR`
    /// Default: platform data directory.
    pub data_dir: PathBuf,

    /// Env: `MYTHOS_API_KEY`, then `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Env: `MYTHOS_API_BASE`
    pub api_base: String,

    /// Model for name extraction and prompt repair.
    /// Env: `MYTHOS_TEXT_MODEL`
    pub text_model: String,

    /// Env: `MYTHOS_IMAGE_MODEL`
    pub image_model: String,

    /// Local diffusion server.
    /// Env: `MYTHOS_DIFFUSION_URL`
    pub diffusion_url: String,

    /// Hard limit for one batch task.
    /// Env: `MYTHOS_TASK_TIMEOUT_SECS`
    pub task_timeout: Duration,

    /// Env: `MYTHOS_DEFAULT_CULTURE`
    pub default_culture: String,

    /// Env: `MYTHOS_CACHE_QUOTA_BYTES`
    pub cache_quota_bytes: usize,
}

// API key stays out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("api_base", &self.api_base)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("diffusion_url", &self.diffusion_url)
            .field("task_timeout", &self.task_timeout)
            .field("default_culture", &self.default_culture)
            .field("cache_quota_bytes", &self.cache_quota_bytes)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("com", "mythos", "mythos")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./mythos-data"));

        Self {
            data_dir,
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            image_model: "gemini-2.0-flash-preview-image-generation".to_string(),
            diffusion_url: "http://127.0.0.1:7860".to_string(),
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            default_culture: DEFAULT_CULTURE.to_string(),
            cache_quota_bytes: DEFAULT_CACHE_QUOTA_BYTES,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("MYTHOS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config.api_key = var("MYTHOS_API_KEY").or_else(|| var("GEMINI_API_KEY"));

        if let Some(base) = var("MYTHOS_API_BASE") {
            config.api_base = base;
        }
        if let Some(model) = var("MYTHOS_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Some(model) = var("MYTHOS_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(url) = var("MYTHOS_DIFFUSION_URL") {
            config.diffusion_url = url;
        }

        if let Some(val) = var("MYTHOS_TASK_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.task_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid MYTHOS_TASK_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(culture) = var("MYTHOS_DEFAULT_CULTURE") {
            config.default_culture = culture.trim().to_string();
        }

        if let Some(val) = var("MYTHOS_CACHE_QUOTA_BYTES") {
            match val.trim().parse::<usize>() {
                Ok(bytes) => config.cache_quota_bytes = bytes,
                Err(_) => tracing::warn!(value = %val, "Invalid MYTHOS_CACHE_QUOTA_BYTES, using default"),
            }
        }

        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("mythos.db")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}
