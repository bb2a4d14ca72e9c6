//! Command-line interface for requeue.

pub mod args;
pub mod commands;
