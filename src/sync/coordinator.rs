//! Queue orchestration: events, side cache, and the queue registry.
//!
//! A `SyncCoordinator` wraps one `SyncSet`, turns its replay hooks into
//! `QueueEvent` broadcasts on the notification bus, and best-effort writes
//! successful response bodies into a side cache. The `QueueRegistry` is
//! the explicit name-to-coordinator map owned by the worker process.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tracing::warn;

use super::entry::{QueueEntry, ReplayRequest, SyncMeta};
use super::event::{ErrorInfo, QueueEvent};
use super::notify::NotificationBus;
use super::set::{ReplayPolicy, SyncSet, SyncSetHooks};
use crate::api::{ReplayResponse, ReplayTransport};
use crate::error::RequeueError;
use crate::storage::DurableStore;

/// File-backed cache of replayed response bodies, keyed by request target.
///
/// Writes are overwrite-only by key, so concurrent access needs no
/// coordination beyond the filesystem's atomic rename-free put.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Create a cache rooted at the given directory.
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store a response body for a target, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the write
    /// fails.
    pub fn put(&self, target: &str, data: &serde_json::Value) -> Result<(), RequeueError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::key(target));
        fs::write(&path, serde_json::to_vec_pretty(data)?)?;
        Ok(())
    }

    /// Fetch the cached body for a target, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn get(&self, target: &str) -> Result<Option<serde_json::Value>, RequeueError> {
        let path = self.dir.join(Self::key(target));
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn key(target: &str) -> String {
        format!("{}.json", hex::encode(Sha256::digest(target.as_bytes())))
    }
}

/// The outcome of attempting a request immediately.
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// The request completed; nothing was queued.
    Completed(ReplayResponse),
    /// The request failed retryably and was queued under this id.
    Queued {
        /// Generated id of the queued entry.
        request_id: String,
    },
}

/// Orchestrates one queue: replay outcomes become broadcasts and side
/// effects.
pub struct SyncCoordinator {
    queue_name: String,
    set: Mutex<SyncSet>,
    bus: Arc<NotificationBus>,
    transport: Arc<dyn ReplayTransport>,
    cache: Option<ResponseCache>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("queue_name", &self.queue_name)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Build a coordinator and its underlying queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store cannot be read.
    pub fn new(
        queue_name: impl Into<String>,
        store: Box<dyn DurableStore>,
        transport: Arc<dyn ReplayTransport>,
        policy: ReplayPolicy,
        bus: Arc<NotificationBus>,
        cache: Option<ResponseCache>,
    ) -> Result<Arc<Self>, RequeueError> {
        let queue_name = queue_name.into();

        let hooks = Self::make_hooks(&queue_name, &bus, cache.clone());
        let set = SyncSet::new(
            queue_name.clone(),
            store,
            Arc::clone(&transport),
            policy,
            hooks,
        )?;

        Ok(Arc::new(Self {
            queue_name,
            set: Mutex::new(set),
            bus,
            transport,
            cache,
        }))
    }

    fn make_hooks(
        queue_name: &str,
        bus: &Arc<NotificationBus>,
        cache: Option<ResponseCache>,
    ) -> SyncSetHooks {
        let pending_queue = queue_name.to_string();
        let pending_bus = Arc::clone(bus);

        let success_queue = queue_name.to_string();
        let success_bus = Arc::clone(bus);

        let fail_queue = queue_name.to_string();
        let fail_bus = Arc::clone(bus);

        SyncSetHooks {
            on_pending: Some(Box::new(move |entry: &QueueEntry, meta: &SyncMeta| {
                pending_bus.publish(
                    &pending_queue,
                    &QueueEvent::Pending {
                        queue_name: pending_queue.clone(),
                        meta: *meta,
                        request: entry.request.clone(),
                    },
                );
            })),
            on_success: Some(Box::new(
                move |entry: &QueueEntry, meta: &SyncMeta, response: &ReplayResponse| {
                    let was_cached = cache.as_ref().map(|cache| {
                        match cache.put(&entry.request.target, &response.body) {
                            Ok(()) => true,
                            Err(e) => {
                                warn!(target = %entry.request.target, error = %e,
                                      "failed to cache replayed response, skipping");
                                false
                            }
                        }
                    });

                    success_bus.publish(
                        &success_queue,
                        &QueueEvent::Success {
                            queue_name: success_queue.clone(),
                            meta: *meta,
                            request: entry.request.clone(),
                            data: response.body.clone(),
                            was_cached,
                        },
                    );
                },
            )),
            on_fail: Some(Box::new(move |entry, meta, error| {
                fail_bus.publish(
                    &fail_queue,
                    &QueueEvent::Fail {
                        queue_name: fail_queue.clone(),
                        meta: *meta,
                        request: entry.request.clone(),
                        error: ErrorInfo {
                            kind: error.kind.as_str().to_string(),
                            message: error.message.clone(),
                        },
                    },
                );
            })),
        }
    }

    fn set(&self) -> Result<MutexGuard<'_, SyncSet>, RequeueError> {
        self.set
            .lock()
            .map_err(|_| RequeueError::Worker("queue state poisoned".to_string()))
    }

    /// The queue this coordinator owns.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Queue a request without attempting it, broadcasting an `Add` event.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be persisted.
    pub fn add(&self, request: ReplayRequest) -> Result<String, RequeueError> {
        let request_id = self.set()?.add(request.clone())?;

        self.bus.publish(
            &self.queue_name,
            &QueueEvent::Add {
                queue_name: self.queue_name.clone(),
                request_id: request_id.clone(),
                request,
            },
        );

        Ok(request_id)
    }

    /// Attempt a request now; queue it only on a retryable failure.
    ///
    /// # Errors
    ///
    /// Returns an error for non-retryable transport failures, or if
    /// queueing the request fails.
    pub fn execute_or_queue(&self, request: ReplayRequest) -> Result<ExecuteOutcome, RequeueError> {
        match self.transport.send(&request) {
            Ok(response) => Ok(ExecuteOutcome::Completed(response)),
            Err(error) if error.retryable => {
                let request_id = self.add(request)?;
                Ok(ExecuteOutcome::Queued { request_id })
            }
            Err(error) => Err(RequeueError::Transport(error.to_string())),
        }
    }

    /// Run one replay cycle and broadcast its completion.
    ///
    /// Cycles for one queue are serialized here: the queue state is locked
    /// for the duration of the cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store fails mid-cycle.
    pub fn sync(&self) -> Result<SyncMeta, RequeueError> {
        let meta = self.set()?.sync()?;

        self.bus.publish(
            &self.queue_name,
            &QueueEvent::SyncEnded {
                queue_name: self.queue_name.clone(),
                meta,
            },
        );

        Ok(meta)
    }

    /// Snapshot of the live entries, in enqueue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue state is unavailable.
    pub fn entries(&self) -> Result<Vec<QueueEntry>, RequeueError> {
        Ok(self.set()?.get_all().to_vec())
    }

    /// Whether an entry with this id is live.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue state is unavailable.
    pub fn has(&self, request_id: &str) -> Result<bool, RequeueError> {
        Ok(self.set()?.has(request_id))
    }

    /// Number of live entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue state is unavailable.
    pub fn len(&self) -> Result<usize, RequeueError> {
        Ok(self.set()?.len())
    }

    /// Store externally provided data in this queue's response cache.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache is configured or the write fails.
    pub fn put_cache(&self, target: &str, data: &serde_json::Value) -> Result<(), RequeueError> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            RequeueError::NotFound(format!(
                "no response cache configured for queue \"{}\"",
                self.queue_name
            ))
        })?;

        cache.put(target, data)
    }
}

/// Explicit name-to-coordinator registry owned by the worker process.
///
/// At most one coordinator per name; registering a name again replaces the
/// prior coordinator.
#[derive(Default)]
pub struct QueueRegistry {
    coordinators: Mutex<HashMap<String, Arc<SyncCoordinator>>>,
}

impl QueueRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coordinator under its queue name.
    pub fn register(&self, coordinator: Arc<SyncCoordinator>) {
        let Ok(mut coordinators) = self.coordinators.lock() else {
            return;
        };

        let name = coordinator.queue_name().to_string();
        if coordinators.insert(name.clone(), coordinator).is_some() {
            warn!(queue = %name, "replacing existing queue registration");
        }
    }

    /// Look up a coordinator by queue name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<SyncCoordinator>> {
        self.coordinators
            .lock()
            .ok()
            .and_then(|coordinators| coordinators.get(name).cloned())
    }

    /// Look up a coordinator, failing loudly for unknown names.
    ///
    /// # Errors
    ///
    /// Returns `QueueNotFound` for a name with no registration; an
    /// unknown queue is distinct from an empty one.
    pub fn get(&self, name: &str) -> Result<Arc<SyncCoordinator>, RequeueError> {
        self.lookup(name)
            .ok_or_else(|| RequeueError::QueueNotFound(name.to_string()))
    }

    /// Registered queue names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .coordinators
            .lock()
            .map(|coordinators| coordinators.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
