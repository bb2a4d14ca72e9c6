//! Worker-side IPC server.
//!
//! Listens on a Unix socket for observer requests. Plain requests are
//! answered on their connection and closed; a `Subscribe` request keeps
//! the connection open and streams broadcast events to it until the
//! observer disconnects.

use std::fs;
use std::io::Write as _;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use tracing::{info, warn};

use super::protocol::{framing, WorkerRequest, WorkerResponse};
use crate::config::Paths;
use crate::error::RequeueError;
use crate::sync::{ExecuteOutcome, NotificationBus, QueueEvent, QueueRegistry};

/// I/O timeout for plain request/response connections.
const TIMEOUT_SECS: u64 = 5;
/// Granularity at which background loops notice shutdown.
const TICK: Duration = Duration::from_millis(500);

/// The worker's accept loop and background replay timer.
pub struct WorkerServer {
    registry: Arc<QueueRegistry>,
    bus: Arc<NotificationBus>,
    paths: Paths,
    auto_sync: Option<Duration>,
}

impl WorkerServer {
    /// Create a server over a registry and its bus.
    ///
    /// `auto_sync` is the interval between automatic replay cycles for
    /// non-empty queues; `None` disables automatic replay.
    #[must_use]
    pub const fn new(
        registry: Arc<QueueRegistry>,
        bus: Arc<NotificationBus>,
        paths: Paths,
        auto_sync: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            bus,
            paths,
            auto_sync,
        }
    }

    /// Run the worker until a `Shutdown` request arrives.
    ///
    /// Acquires the single-instance lock, writes the PID file, binds the
    /// socket, and prints `READY` once accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if another worker holds the lock or the socket
    /// cannot be bound.
    pub fn run(&self) -> Result<(), RequeueError> {
        self.paths.ensure_dirs()?;

        let lock_file = acquire_lock(&self.paths.lock_file)?;
        fs::write(&self.paths.pid_file, std::process::id().to_string())?;

        // Remove stale socket if it exists
        let _ = fs::remove_file(&self.paths.socket);
        let listener = UnixListener::bind(&self.paths.socket)
            .map_err(|e| RequeueError::Worker(format!("failed to bind socket: {e}")))?;

        info!("listening on {}", self.paths.socket.display());

        // Signal readiness to parent process
        println!("READY");
        let _ = std::io::stdout().flush();

        let running = Arc::new(AtomicBool::new(true));
        let timer = self.auto_sync.map(|interval| {
            let registry = Arc::clone(&self.registry);
            let running = Arc::clone(&running);
            thread::spawn(move || auto_sync_loop(&registry, &running, interval))
        });

        for stream in listener.incoming() {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            match stream {
                Ok(stream) => {
                    let registry = Arc::clone(&self.registry);
                    let bus = Arc::clone(&self.bus);
                    let running = Arc::clone(&running);
                    let socket_path = self.paths.socket.clone();
                    thread::spawn(move || {
                        handle_connection(stream, &registry, &bus, &running, &socket_path);
                    });
                }
                Err(e) => {
                    warn!("failed to accept connection: {}", e);
                }
            }
        }

        if let Some(timer) = timer {
            let _ = timer.join();
        }

        let _ = fs::remove_file(&self.paths.pid_file);
        let _ = fs::remove_file(&self.paths.socket);
        drop(lock_file);
        info!("worker stopped");
        Ok(())
    }
}

/// Periodically replay every non-empty queue.
fn auto_sync_loop(registry: &QueueRegistry, running: &AtomicBool, interval: Duration) {
    while running.load(Ordering::SeqCst) {
        let mut waited = Duration::ZERO;
        while waited < interval {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(TICK.min(interval - waited));
            waited += TICK;
        }

        for name in registry.names() {
            let Some(coordinator) = registry.lookup(&name) else {
                continue;
            };
            let backlog = coordinator.len().unwrap_or(0);
            if backlog == 0 {
                continue;
            }

            info!(queue = %name, backlog, "automatic replay starting");
            if let Err(e) = coordinator.sync() {
                warn!(queue = %name, error = %e, "automatic replay aborted");
            }
        }
    }
}

fn handle_connection(
    mut stream: UnixStream,
    registry: &QueueRegistry,
    bus: &NotificationBus,
    running: &AtomicBool,
    socket_path: &Path,
) {
    let _ = stream.set_write_timeout(Some(Duration::from_secs(TIMEOUT_SECS)));

    let request: WorkerRequest = match framing::read_message(&mut stream) {
        Ok(request) => request,
        Err(e) => {
            warn!("failed to read request: {}", e);
            return;
        }
    };

    match request {
        WorkerRequest::Subscribe { queue_name } => {
            handle_subscription(stream, registry, bus, &queue_name);
        }
        WorkerRequest::Shutdown => {
            let _ = framing::write_message(&mut stream, &WorkerResponse::ShuttingDown);
            running.store(false, Ordering::SeqCst);
            // Wake the accept loop so it observes the flag
            let _ = UnixStream::connect(socket_path);
        }
        other => {
            let response = handle_request(other, registry);
            let _ = framing::write_message(&mut stream, &response);
        }
    }
}

fn handle_request(request: WorkerRequest, registry: &QueueRegistry) -> WorkerResponse {
    match request {
        WorkerRequest::Ping => WorkerResponse::Pong,
        WorkerRequest::GetSyncSet { queue_name } => {
            with_queue(registry, &queue_name, |coordinator| {
                coordinator
                    .entries()
                    .map(|entries| WorkerResponse::Entries { entries })
            })
        }
        WorkerRequest::DoSyncSet { queue_name } => {
            with_queue(registry, &queue_name, |coordinator| {
                coordinator.sync().map(|meta| WorkerResponse::SyncDone { meta })
            })
        }
        WorkerRequest::AddRequest {
            queue_name,
            request,
        } => with_queue(registry, &queue_name, |coordinator| {
            coordinator
                .add(request)
                .map(|request_id| WorkerResponse::Added { request_id })
        }),
        WorkerRequest::ExecuteOrQueue {
            queue_name,
            request,
        } => with_queue(registry, &queue_name, |coordinator| {
            coordinator.execute_or_queue(request).map(|outcome| match outcome {
                ExecuteOutcome::Completed(response) => WorkerResponse::Executed { response },
                ExecuteOutcome::Queued { request_id } => WorkerResponse::Queued { request_id },
            })
        }),
        WorkerRequest::PutCache {
            queue_name,
            target,
            data,
        } => with_queue(registry, &queue_name, |coordinator| {
            coordinator
                .put_cache(&target, &data)
                .map(|()| WorkerResponse::CachePut)
        }),
        // Handled before dispatch; answering them here is a bug
        WorkerRequest::Subscribe { .. } | WorkerRequest::Shutdown => WorkerResponse::Error {
            message: "request cannot be dispatched".to_string(),
        },
    }
}

fn with_queue<F>(registry: &QueueRegistry, queue_name: &str, action: F) -> WorkerResponse
where
    F: FnOnce(Arc<crate::sync::SyncCoordinator>) -> Result<WorkerResponse, RequeueError>,
{
    match registry.lookup(queue_name) {
        Some(coordinator) => action(coordinator).unwrap_or_else(|e| WorkerResponse::Error {
            message: e.to_string(),
        }),
        None => WorkerResponse::UnknownQueue {
            queue_name: queue_name.to_string(),
        },
    }
}

/// Stream broadcast events for one queue over the connection until the
/// observer disconnects.
fn handle_subscription(
    mut stream: UnixStream,
    registry: &QueueRegistry,
    bus: &NotificationBus,
    queue_name: &str,
) {
    if registry.lookup(queue_name).is_none() {
        let _ = framing::write_message(
            &mut stream,
            &WorkerResponse::UnknownQueue {
                queue_name: queue_name.to_string(),
            },
        );
        return;
    }

    let (tx, rx) = mpsc::channel::<QueueEvent>();
    let tx = Mutex::new(tx);
    let handle = bus.subscribe(queue_name, move |event| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(event.clone());
        }
    });

    if framing::write_message(&mut stream, &WorkerResponse::Subscribed).is_err() {
        bus.unsubscribe(&handle);
        return;
    }

    info!(queue = %queue_name, "observer subscribed");

    for event in rx {
        if framing::write_message(&mut stream, &WorkerResponse::Event { event }).is_err() {
            break;
        }
    }

    bus.unsubscribe(&handle);
    info!(queue = %queue_name, "observer disconnected");
}

fn acquire_lock(lock_path: &Path) -> Result<fs::File, RequeueError> {
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;

    file.try_lock_exclusive()
        .map_err(|_| RequeueError::Worker("another worker instance is already running".to_string()))?;

    Ok(file)
}
