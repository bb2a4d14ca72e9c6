//! Process boundary between the worker and its observers.
//!
//! The worker process owns the queues; CLI processes talk to it over a
//! Unix socket with length-prefixed JSON messages. Broadcast events cross
//! the same boundary on dedicated subscription connections.

pub mod protocol;
pub mod proxy;
pub mod server;

pub use protocol::{WorkerRequest, WorkerResponse};
pub use proxy::RemoteProxy;
pub use server::WorkerServer;
