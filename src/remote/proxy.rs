//! Observer-side handle to the worker process.
//!
//! A `RemoteProxy` issues request/response calls over short-lived
//! connections and re-exposes the worker's broadcast stream as local
//! callback subscriptions, demultiplexed by queue name.

use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::Paths;
use crate::error::RequeueError;
use crate::sync::{
    ExecuteOutcome, NotificationBus, QueueEntry, QueueEvent, ReplayRequest, SubscriptionHandle,
    SyncMeta,
};

use super::protocol::{framing, WorkerRequest, WorkerResponse};

/// Write timeout for worker communication. Reads are unbounded because a
/// replay cycle legitimately takes as long as its slowest attempt.
const WRITE_TIMEOUT_SECS: u64 = 5;

/// Client-side handle to a worker across the process boundary.
pub struct RemoteProxy {
    socket_path: PathBuf,
    local_bus: Arc<NotificationBus>,
    subscribed: Mutex<HashMap<String, ()>>,
}

impl RemoteProxy {
    /// Create a proxy talking to the worker at the given socket path.
    #[must_use]
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            local_bus: Arc::new(NotificationBus::new()),
            subscribed: Mutex::new(HashMap::new()),
        }
    }

    /// Create a proxy for the worker described by a set of paths.
    #[must_use]
    pub fn for_paths(paths: &Paths) -> Self {
        Self::new(paths.socket.clone())
    }

    fn connect(&self) -> Result<UnixStream, RequeueError> {
        let stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            RequeueError::Worker(format!(
                "failed to connect to worker (is it running?): {e}"
            ))
        })?;

        stream
            .set_write_timeout(Some(Duration::from_secs(WRITE_TIMEOUT_SECS)))
            .map_err(|e| RequeueError::Worker(format!("failed to set write timeout: {e}")))?;

        Ok(stream)
    }

    /// Send one request and receive its response.
    fn request(&self, request: &WorkerRequest) -> Result<WorkerResponse, RequeueError> {
        let mut stream = self.connect()?;

        framing::write_message(&mut stream, request)
            .map_err(|e| RequeueError::Worker(format!("failed to send request: {e}")))?;
        framing::read_message(&mut stream)
            .map_err(|e| RequeueError::Worker(format!("failed to read response: {e}")))
    }

    /// Check that the worker is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is unreachable.
    pub fn ping(&self) -> Result<(), RequeueError> {
        match self.request(&WorkerRequest::Ping)? {
            WorkerResponse::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Ask the worker to shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is unreachable.
    pub fn shutdown(&self) -> Result<(), RequeueError> {
        match self.request(&WorkerRequest::Shutdown)? {
            WorkerResponse::ShuttingDown => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Fetch a queue's live entries, in enqueue order.
    ///
    /// # Errors
    ///
    /// Returns `QueueNotFound` for an unregistered queue name; an unknown
    /// queue is not the same as an empty one.
    pub fn get_entries(&self, queue_name: &str) -> Result<Vec<QueueEntry>, RequeueError> {
        match self.request(&WorkerRequest::GetSyncSet {
            queue_name: queue_name.to_string(),
        })? {
            WorkerResponse::Entries { entries } => Ok(entries),
            other => Err(error_from(other)),
        }
    }

    /// Trigger one replay cycle and wait for its final counters.
    ///
    /// # Errors
    ///
    /// Returns `QueueNotFound` for an unregistered queue name, or the
    /// cycle's own failure. Fatal to this call, not to the worker.
    pub fn trigger_sync(&self, queue_name: &str) -> Result<SyncMeta, RequeueError> {
        match self.request(&WorkerRequest::DoSyncSet {
            queue_name: queue_name.to_string(),
        })? {
            WorkerResponse::SyncDone { meta } => Ok(meta),
            other => Err(error_from(other)),
        }
    }

    /// Queue a request without attempting it.
    ///
    /// # Errors
    ///
    /// Returns `QueueNotFound` for an unregistered queue name or the
    /// worker's failure to persist the entry.
    pub fn add_request(
        &self,
        queue_name: &str,
        request: ReplayRequest,
    ) -> Result<String, RequeueError> {
        match self.request(&WorkerRequest::AddRequest {
            queue_name: queue_name.to_string(),
            request,
        })? {
            WorkerResponse::Added { request_id } => Ok(request_id),
            other => Err(error_from(other)),
        }
    }

    /// Attempt a request now; the worker queues it on retryable failure.
    ///
    /// # Errors
    ///
    /// Returns `QueueNotFound` for an unregistered queue name or a
    /// non-retryable transport failure.
    pub fn execute_or_queue(
        &self,
        queue_name: &str,
        request: ReplayRequest,
    ) -> Result<ExecuteOutcome, RequeueError> {
        match self.request(&WorkerRequest::ExecuteOrQueue {
            queue_name: queue_name.to_string(),
            request,
        })? {
            WorkerResponse::Executed { response } => Ok(ExecuteOutcome::Completed(response)),
            WorkerResponse::Queued { request_id } => Ok(ExecuteOutcome::Queued { request_id }),
            other => Err(error_from(other)),
        }
    }

    /// Store data in a queue's response cache on the worker side.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is unknown or has no cache.
    pub fn put_cache(
        &self,
        queue_name: &str,
        target: &str,
        data: serde_json::Value,
    ) -> Result<(), RequeueError> {
        match self.request(&WorkerRequest::PutCache {
            queue_name: queue_name.to_string(),
            target: target.to_string(),
            data,
        })? {
            WorkerResponse::CachePut => Ok(()),
            other => Err(error_from(other)),
        }
    }

    /// Register a local callback for a queue's broadcast events.
    ///
    /// The first subscription for a queue opens a dedicated event-stream
    /// connection; later ones share it. Use [`RemoteProxy::off`] with the
    /// returned handle to stop receiving events.
    ///
    /// # Errors
    ///
    /// Returns `QueueNotFound` if the worker does not know the queue.
    pub fn on_queue_event<F>(
        &self,
        queue_name: &str,
        callback: F,
    ) -> Result<SubscriptionHandle, RequeueError>
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.ensure_event_stream(queue_name)?;
        Ok(self.local_bus.subscribe(queue_name, callback))
    }

    /// Remove a callback registered with [`RemoteProxy::on_queue_event`].
    pub fn off(&self, handle: &SubscriptionHandle) {
        self.local_bus.unsubscribe(handle);
    }

    /// Open the event-stream connection for a queue if none exists yet.
    fn ensure_event_stream(&self, queue_name: &str) -> Result<(), RequeueError> {
        let mut subscribed = self
            .subscribed
            .lock()
            .map_err(|_| RequeueError::Worker("proxy state poisoned".to_string()))?;

        if subscribed.contains_key(queue_name) {
            return Ok(());
        }

        let mut stream = self.connect()?;
        framing::write_message(
            &mut stream,
            &WorkerRequest::Subscribe {
                queue_name: queue_name.to_string(),
            },
        )
        .map_err(|e| RequeueError::Worker(format!("failed to subscribe: {e}")))?;

        let ack: WorkerResponse = framing::read_message(&mut stream)
            .map_err(|e| RequeueError::Worker(format!("failed to subscribe: {e}")))?;
        match ack {
            WorkerResponse::Subscribed => {}
            other => return Err(error_from(other)),
        }

        let bus = Arc::clone(&self.local_bus);
        let topic = queue_name.to_string();
        thread::spawn(move || loop {
            match framing::read_message::<_, WorkerResponse>(&mut stream) {
                Ok(WorkerResponse::Event { event }) => bus.publish(&topic, &event),
                Ok(_) => {}
                Err(_) => break,
            }
        });

        subscribed.insert(queue_name.to_string(), ());
        Ok(())
    }
}

fn error_from(response: WorkerResponse) -> RequeueError {
    match response {
        WorkerResponse::UnknownQueue { queue_name } => RequeueError::QueueNotFound(queue_name),
        WorkerResponse::Error { message } => RequeueError::Worker(message),
        other => unexpected(&other),
    }
}

fn unexpected(response: &WorkerResponse) -> RequeueError {
    RequeueError::Worker(format!("unexpected response: {response:?}"))
}
