//! Configuration settings for requeue.
//!
//! Settings are loaded from `~/.requeue/config.yaml`.

use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::error::RequeueError;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker process settings.
    pub worker: WorkerConfig,
    /// Queues registered by the worker at startup.
    pub queues: Vec<QueueConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            queues: vec![QueueConfig::default()],
        }
    }
}

/// Worker process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between automatic replay attempts while a queue is
    /// non-empty. Zero disables automatic replay.
    #[serde(default = "default_auto_sync_secs")]
    pub auto_sync_secs: u64,
    /// Request timeout for replay attempts, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            auto_sync_secs: default_auto_sync_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Per-queue replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name, unique within the worker.
    pub name: String,
    /// Minimum interval between attempt launches, in milliseconds.
    ///
    /// When set, entries are replayed in rate-limited parallel mode:
    /// launches are spaced by this interval but do not wait for the
    /// previous attempt to complete. When absent, replay is sequential.
    /// Only use this against servers known to tolerate concurrent writes.
    pub parallel_interval_ms: Option<u64>,
    /// Whether to store replayed response bodies in the side cache.
    #[serde(default = "default_true")]
    pub cache_responses: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            parallel_interval_ms: None,
            cache_responses: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns the default configuration if no config file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, RequeueError> {
        let paths = Paths::new()?;
        Self::load_from(&paths)
    }

    /// Load configuration from a specific set of paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(paths: &Paths) -> Result<Self, RequeueError> {
        if !paths.config_file.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&paths.config_file)
            .map_err(|e| RequeueError::Config(format!("Failed to read config: {e}")))?;

        serde_yaml::from_str(&contents)
            .map_err(|e| RequeueError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to its file, creating directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, paths: &Paths) -> Result<(), RequeueError> {
        paths.ensure_dirs()?;

        let contents = serde_yaml::to_string(self)
            .map_err(|e| RequeueError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(&paths.config_file, contents)
            .map_err(|e| RequeueError::Config(format!("Failed to write config: {e}")))
    }

    /// Look up a queue's settings by name.
    #[must_use]
    pub fn queue(&self, name: &str) -> Option<&QueueConfig> {
        self.queues.iter().find(|q| q.name == name)
    }
}

const fn default_auto_sync_secs() -> u64 {
    30
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}
