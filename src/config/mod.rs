//! Configuration management for requeue.
//!
//! This module handles loading and saving configuration from `~/.requeue/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{Config, QueueConfig, WorkerConfig};
