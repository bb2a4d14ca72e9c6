//! Storage layer for requeue.
//!
//! This module provides SQLite-based persistence for the durable queues:
//! the restart-surviving store each queue drains and refills during replay.

mod database;
mod migrations;
mod store;

pub use database::Database;
pub use store::{DurableStore, SqliteStore};
