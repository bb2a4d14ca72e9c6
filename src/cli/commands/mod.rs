//! Command implementations for requeue.
//!
//! Every command except `worker run` talks to the worker process through
//! a [`RemoteProxy`](crate::remote::RemoteProxy); the worker owns the
//! queues and all durable state.

mod completions;
mod queue;
mod sync;
mod watch;
mod worker;

pub use completions::completions;
pub use queue::{add, list, send, status};
pub use sync::sync;
pub use watch::watch;
pub use worker::{worker_run, worker_status, worker_stop};
