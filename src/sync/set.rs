//! Named queue and replay engine.
//!
//! A `SyncSet` owns one named queue: a live, insertion-ordered entry list
//! backed by a durable store, plus the replay cycle that drains the store
//! and re-issues each request through the injected transport.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::entry::{EntryStatus, QueueEntry, ReplayRequest, SyncMeta};
use crate::api::{ReplayResponse, ReplayTransport, TransportError};
use crate::error::RequeueError;
use crate::storage::DurableStore;

/// How a replay cycle schedules its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Attempt entries one at a time, awaiting each outcome before the
    /// next. Preserves strict ordering of side effects.
    Sequential,
    /// Launch attempts without waiting for the previous one, spacing
    /// launches by a fixed minimum interval. Only launch order is
    /// guaranteed; use against servers that tolerate concurrent writes.
    RateLimited {
        /// Minimum delay between attempt launches.
        interval: Duration,
    },
}

/// Callback invoked as an entry's attempt begins.
pub type PendingHook = Box<dyn Fn(&QueueEntry, &SyncMeta) + Send>;
/// Callback invoked after a successful attempt, with the response.
pub type SuccessHook = Box<dyn Fn(&QueueEntry, &SyncMeta, &ReplayResponse) + Send>;
/// Callback invoked after a failed attempt, with the error.
pub type FailHook = Box<dyn Fn(&QueueEntry, &SyncMeta, &TransportError) + Send>;

/// Per-outcome callbacks a coordinator hangs off the replay cycle.
#[derive(Default)]
pub struct SyncSetHooks {
    pub on_pending: Option<PendingHook>,
    pub on_success: Option<SuccessHook>,
    pub on_fail: Option<FailHook>,
}

/// One named queue with its replay engine.
///
/// The entry list is the externally visible source of truth for what is
/// queued; it is a cache rebuilt from the durable store at construction,
/// so pending entries from a previous process come back as standby.
///
/// `sync` must not run concurrently with itself for the same queue:
/// overlapping cycles would double-drain the store. Callers keep the set
/// behind a mutex; `add` may interleave with a running cycle and is then
/// picked up by the next one.
pub struct SyncSet {
    name: String,
    entries: Vec<QueueEntry>,
    store: Box<dyn DurableStore>,
    transport: Arc<dyn ReplayTransport>,
    policy: ReplayPolicy,
    hooks: SyncSetHooks,
}

impl SyncSet {
    /// Create a set over a durable store, rebuilding the live entry list
    /// from whatever the store holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(
        name: impl Into<String>,
        store: Box<dyn DurableStore>,
        transport: Arc<dyn ReplayTransport>,
        policy: ReplayPolicy,
        hooks: SyncSetHooks,
    ) -> Result<Self, RequeueError> {
        let mut entries = store.list_all()?;
        entries.sort_by_key(|e| e.enqueued_at);
        for entry in &mut entries {
            entry.status = EntryStatus::Standby;
        }

        Ok(Self {
            name: name.into(),
            entries,
            store,
            transport,
            policy,
            hooks,
        })
    }

    /// The queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue has no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue a request: persist it, expose it as a standby entry, and
    /// return its generated id. Performs no network I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails; the entry is then not
    /// queued at all.
    pub fn add(&mut self, request: ReplayRequest) -> Result<String, RequeueError> {
        let entry = QueueEntry::new(request);
        self.store.push(&entry)?;

        let request_id = entry.request_id.clone();
        self.entries.push(entry);
        Ok(request_id)
    }

    /// Whether an entry with this id is live.
    #[must_use]
    pub fn has(&self, request_id: &str) -> bool {
        self.entries.iter().any(|e| e.request_id == request_id)
    }

    /// The current live entries, in enqueue order.
    #[must_use]
    pub fn get_all(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Run one replay cycle over the current backlog.
    ///
    /// Drains the store completely, restores original enqueue order (the
    /// store yields most-recently-pushed first), and attempts each entry.
    /// Successes leave the queue; failures stay durably stored and are
    /// retried by a later cycle. Attempt failures never abort the cycle;
    /// store failures do.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store becomes unavailable, aborting
    /// the remainder of the cycle.
    pub fn sync(&mut self) -> Result<SyncMeta, RequeueError> {
        let now = Utc::now();
        for entry in &mut self.entries {
            entry.status = EntryStatus::Standby;
            entry.last_attempt_at = Some(now);
        }

        let mut meta = SyncMeta::started(self.entries.len());

        let mut drained = Vec::new();
        while let Some(entry) = self.store.pop_most_recent()? {
            drained.push(entry);
        }
        drained.reverse();

        // Re-persist the batch before attempting anything: an entry must
        // stay durable until its attempt is confirmed, so a crash at any
        // point leaves exactly one stored copy.
        for entry in &drained {
            self.store.push(entry)?;
        }

        debug!(queue = %self.name, total = drained.len(), "replay cycle starting");

        match self.policy {
            ReplayPolicy::Sequential => {
                for entry in drained {
                    self.begin_attempt(&entry, &meta);
                    let outcome = self.transport.send(&entry.request);
                    self.settle(entry, outcome, &mut meta)?;
                }
            }
            ReplayPolicy::RateLimited { interval } => {
                self.replay_spaced(drained, interval, &mut meta)?;
            }
        }

        Ok(meta)
    }

    /// Launch attempts on worker threads, spaced by `interval`, and apply
    /// outcomes serially in arrival order.
    fn replay_spaced(
        &mut self,
        drained: Vec<QueueEntry>,
        interval: Duration,
        meta: &mut SyncMeta,
    ) -> Result<(), RequeueError> {
        let total = drained.len();
        let (tx, rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(total);

        for (launched, entry) in drained.into_iter().enumerate() {
            self.begin_attempt(&entry, meta);

            let transport = Arc::clone(&self.transport);
            let tx = tx.clone();
            handles.push(thread::spawn(move || {
                let outcome = transport.send(&entry.request);
                // The cycle thread owns all mutation; receive errors only
                // happen when the cycle already aborted.
                let _ = tx.send((entry, outcome));
            }));

            if launched + 1 < total {
                thread::sleep(interval);
            }
        }
        drop(tx);

        let mut cycle_error = None;
        for (entry, outcome) in rx {
            match self.settle(entry, outcome, meta) {
                Ok(()) => {}
                Err(e) => {
                    cycle_error.get_or_insert(e);
                }
            }
        }

        for handle in handles {
            let _ = handle.join();
        }

        cycle_error.map_or(Ok(()), Err)
    }

    /// Mark an entry pending and fire the pending hook.
    fn begin_attempt(&mut self, entry: &QueueEntry, meta: &SyncMeta) {
        let now = Utc::now();
        if let Some(live) = self
            .entries
            .iter_mut()
            .find(|e| e.request_id == entry.request_id)
        {
            live.status = EntryStatus::Pending;
            live.last_attempt_at = Some(now);
        }

        if let Some(hook) = &self.hooks.on_pending {
            hook(entry, meta);
        }
    }

    /// Apply one attempt outcome: update the entry list, the store, and
    /// the cycle counters, then fire the matching hook.
    fn settle(
        &mut self,
        entry: QueueEntry,
        outcome: Result<ReplayResponse, TransportError>,
        meta: &mut SyncMeta,
    ) -> Result<(), RequeueError> {
        match outcome {
            Ok(response) => {
                self.entries.retain(|e| e.request_id != entry.request_id);
                self.store.remove(&entry.request_id)?;
                meta.succeeded += 1;

                if let Some(hook) = &self.hooks.on_success {
                    hook(&entry, meta, &response);
                }
            }
            Err(error) => {
                // The entry is still in the store; it only leaves the
                // live list after a confirmed success.
                let now = Utc::now();
                if let Some(live) = self
                    .entries
                    .iter_mut()
                    .find(|e| e.request_id == entry.request_id)
                {
                    live.status = EntryStatus::Finished;
                    live.last_attempt_at = Some(now);
                }
                meta.failed += 1;

                debug!(queue = %self.name, target = %entry.request.target, %error, "attempt failed");
                if let Some(hook) = &self.hooks.on_fail {
                    hook(&entry, meta, &error);
                }
            }
        }

        Ok(())
    }
}
