//! Offline replay queue core.
//!
//! This module contains the queue engine and its notification protocol:
//! - Queue entries and per-cycle progress counters
//! - The replay engine draining a durable store (sequential or
//!   rate-limited parallel)
//! - A keyed publish/subscribe bus for status broadcasts
//! - The coordinator wiring replay outcomes to events and side effects

pub mod coordinator;
pub mod entry;
pub mod event;
pub mod notify;
pub mod set;

pub use coordinator::{ExecuteOutcome, QueueRegistry, ResponseCache, SyncCoordinator};
pub use entry::{generate_request_id, EntryStatus, Method, QueueEntry, ReplayRequest, SyncMeta};
pub use event::{ErrorInfo, QueueEvent};
pub use notify::{NotificationBus, SubscriptionHandle};
pub use set::{ReplayPolicy, SyncSet, SyncSetHooks};
