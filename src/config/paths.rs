//! Path resolution for requeue configuration and state files.
//!
//! All requeue data is stored in `~/.requeue/`:
//! - `config.yaml` - Main configuration file
//! - `requeue.db` - SQLite database holding the durable queues
//! - `cache/` - Side cache of replayed response bodies
//! - `worker.sock` / `worker.pid` / `worker.lock` - Worker process state
//! - `worker.log` - Worker process log

use std::path::PathBuf;

use crate::error::RequeueError;

/// Paths to requeue configuration and state files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.requeue/`
    pub root: PathBuf,
    /// Config file: `~/.requeue/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.requeue/requeue.db`
    pub database: PathBuf,
    /// Response cache directory: `~/.requeue/cache/`
    pub cache: PathBuf,
    /// Worker Unix socket: `~/.requeue/worker.sock`
    pub socket: PathBuf,
    /// Worker PID file: `~/.requeue/worker.pid`
    pub pid_file: PathBuf,
    /// Worker single-instance lock: `~/.requeue/worker.lock`
    pub lock_file: PathBuf,
    /// Worker log file: `~/.requeue/worker.log`
    pub log_file: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, RequeueError> {
        let home = std::env::var("HOME")
            .map_err(|_| RequeueError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".requeue")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("requeue.db"),
            cache: root.join("cache"),
            socket: root.join("worker.sock"),
            pid_file: root.join("worker.pid"),
            lock_file: root.join("worker.lock"),
            log_file: root.join("worker.log"),
            root,
        }
    }

    /// Ensure all directories exist, creating them if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), RequeueError> {
        for dir in [&self.root, &self.cache] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    RequeueError::Config(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| {
            // Fallback to current directory if home cannot be determined
            Self::with_root(PathBuf::from(".requeue"))
        })
    }
}
