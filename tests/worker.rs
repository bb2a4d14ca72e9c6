//! End-to-end tests over the worker socket.
//!
//! Each test spins up a real worker (registry, bus, SQLite store, Unix
//! socket) in a background thread and drives it through a `RemoteProxy`,
//! the same path the CLI uses.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use requeue::api::{ReplayResponse, ReplayTransport, TransportError};
use requeue::config::Paths;
use requeue::error::RequeueError;
use requeue::remote::{RemoteProxy, WorkerServer};
use requeue::storage::{Database, SqliteStore};
use requeue::sync::{
    ExecuteOutcome, NotificationBus, QueueEvent, QueueRegistry, ReplayPolicy, ReplayRequest,
    SyncCoordinator,
};

/// Transport whose outcomes are scripted per target substring.
struct ScriptedTransport {
    fail_targets: Vec<String>,
}

impl ReplayTransport for ScriptedTransport {
    fn send(&self, request: &ReplayRequest) -> Result<ReplayResponse, TransportError> {
        if self.fail_targets.iter().any(|t| t == &request.target) {
            Err(TransportError::connect("connection refused"))
        } else {
            Ok(ReplayResponse {
                status: 200,
                body: json!({"echo": request.target}),
            })
        }
    }
}

struct TestWorker {
    paths: Paths,
    handle: thread::JoinHandle<Result<(), RequeueError>>,
    _temp: TempDir,
}

impl TestWorker {
    fn start(fail_targets: &[&str]) -> Self {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_root(temp.path().join("state"));
        paths.ensure_dirs().unwrap();

        let bus = Arc::new(NotificationBus::new());
        let registry = Arc::new(QueueRegistry::new());

        let store = Box::new(SqliteStore::new(
            Database::open_at(&paths.database).unwrap(),
            "default",
        ));
        let transport = Arc::new(ScriptedTransport {
            fail_targets: fail_targets.iter().map(ToString::to_string).collect(),
        });
        let coordinator = SyncCoordinator::new(
            "default",
            store,
            transport,
            ReplayPolicy::Sequential,
            Arc::clone(&bus),
            None,
        )
        .unwrap();
        registry.register(coordinator);

        let server = WorkerServer::new(registry, bus, paths.clone(), None);
        let handle = thread::spawn(move || server.run());

        let worker = Self {
            paths,
            handle,
            _temp: temp,
        };
        worker.wait_until_ready();
        worker
    }

    fn proxy(&self) -> RemoteProxy {
        RemoteProxy::for_paths(&self.paths)
    }

    fn wait_until_ready(&self) {
        let proxy = self.proxy();
        for _ in 0..200 {
            if proxy.ping().is_ok() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("worker did not become ready");
    }

    fn stop(self) {
        self.proxy().shutdown().unwrap();
        self.handle.join().unwrap().unwrap();
    }
}

/// Subscribe to a queue and collect its events into a channel.
fn subscribe(proxy: &RemoteProxy, queue: &str) -> mpsc::Receiver<QueueEvent> {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    proxy
        .on_queue_event(queue, move |event| {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send(event.clone());
            }
        })
        .unwrap();
    rx
}

fn collect(rx: &mpsc::Receiver<QueueEvent>, count: usize) -> Vec<QueueEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(
            rx.recv_timeout(Duration::from_secs(5))
                .expect("timed out waiting for event"),
        );
    }
    events
}

#[test]
fn ping_and_shutdown() {
    let worker = TestWorker::start(&[]);
    worker.proxy().ping().unwrap();
    worker.stop();
}

#[test]
fn unknown_queue_is_an_explicit_error() {
    let worker = TestWorker::start(&[]);
    let proxy = worker.proxy();

    // Not an empty list: "no queue" and "empty queue" are different answers
    let err = proxy.get_entries("queue-x").unwrap_err();
    assert!(matches!(err, RequeueError::QueueNotFound(name) if name == "queue-x"));

    let err = proxy.trigger_sync("queue-x").unwrap_err();
    assert!(matches!(err, RequeueError::QueueNotFound(_)));

    let err = proxy
        .on_queue_event("queue-x", |_| {})
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, RequeueError::QueueNotFound(_)));

    worker.stop();
}

#[test]
fn empty_queue_syncs_to_zero_meta() {
    let worker = TestWorker::start(&[]);
    let proxy = worker.proxy();
    let events = subscribe(&proxy, "default");

    let meta = proxy.trigger_sync("default").unwrap();
    assert_eq!(meta.total, 0);
    assert_eq!(meta.succeeded, 0);
    assert_eq!(meta.failed, 0);

    // No per-entry notifications, just the cycle end
    let received = collect(&events, 1);
    assert!(matches!(received[0], QueueEvent::SyncEnded { .. }));
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());

    worker.stop();
}

#[test]
fn add_list_replay_roundtrip() {
    let worker = TestWorker::start(&["/api/todos/b"]);
    let proxy = worker.proxy();
    let events = subscribe(&proxy, "default");

    let id_a = proxy
        .add_request(
            "default",
            ReplayRequest::post("/api/todos/a", json!({"text": "buy milk"})),
        )
        .unwrap();
    let id_b = proxy
        .add_request(
            "default",
            ReplayRequest::post("/api/todos/b", json!({"text": "walk dog"})),
        )
        .unwrap();
    assert_ne!(id_a, id_b);

    let entries = proxy.get_entries("default").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].request.target, "/api/todos/a");
    assert_eq!(entries[1].request.target, "/api/todos/b");

    let meta = proxy.trigger_sync("default").unwrap();
    assert_eq!(meta.total, 2);
    assert_eq!(meta.succeeded, 1);
    assert_eq!(meta.failed, 1);

    // The failure stays queued; the success is gone
    let entries = proxy.get_entries("default").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request_id, id_b);

    // Broadcast order: adds, then per-entry progress, then cycle end
    let received = collect(&events, 7);
    let labels: Vec<&str> = received
        .iter()
        .map(|e| match e {
            QueueEvent::Add { .. } => "add",
            QueueEvent::Pending { .. } => "pending",
            QueueEvent::Success { .. } => "success",
            QueueEvent::Fail { .. } => "fail",
            QueueEvent::SyncEnded { .. } => "sync_ended",
        })
        .collect();
    assert_eq!(
        labels,
        vec!["add", "add", "pending", "success", "pending", "fail", "sync_ended"]
    );

    match &received[3] {
        QueueEvent::Success { data, request, .. } => {
            assert_eq!(request.target, "/api/todos/a");
            assert_eq!(data["echo"], "/api/todos/a");
        }
        other => panic!("expected success event, got {other:?}"),
    }

    match &received[5] {
        QueueEvent::Fail { error, .. } => assert_eq!(error.kind, "connect"),
        other => panic!("expected fail event, got {other:?}"),
    }

    worker.stop();
}

#[test]
fn execute_or_queue_across_the_boundary() {
    let worker = TestWorker::start(&["/api/todos/down"]);
    let proxy = worker.proxy();

    let outcome = proxy
        .execute_or_queue("default", ReplayRequest::post("/api/todos/up", json!({})))
        .unwrap();
    assert!(matches!(outcome, ExecuteOutcome::Completed(_)));
    assert!(proxy.get_entries("default").unwrap().is_empty());

    let outcome = proxy
        .execute_or_queue("default", ReplayRequest::post("/api/todos/down", json!({})))
        .unwrap();
    let request_id = match outcome {
        ExecuteOutcome::Queued { request_id } => request_id,
        ExecuteOutcome::Completed(_) => panic!("expected the request to queue"),
    };

    let entries = proxy.get_entries("default").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request_id, request_id);

    worker.stop();
}

#[test]
fn queue_survives_worker_restart() {
    let temp = TempDir::new().unwrap();
    let paths = Paths::with_root(temp.path().join("state"));
    paths.ensure_dirs().unwrap();

    let start = |paths: &Paths| {
        let bus = Arc::new(NotificationBus::new());
        let registry = Arc::new(QueueRegistry::new());
        let store = Box::new(SqliteStore::new(
            Database::open_at(&paths.database).unwrap(),
            "default",
        ));
        let transport = Arc::new(ScriptedTransport {
            fail_targets: vec!["/api/todos".to_string()],
        });
        registry.register(
            SyncCoordinator::new(
                "default",
                store,
                transport,
                ReplayPolicy::Sequential,
                bus.clone(),
                None,
            )
            .unwrap(),
        );
        let server = WorkerServer::new(registry, bus, paths.clone(), None);
        thread::spawn(move || server.run())
    };

    // First worker: queue an entry and replay it once (it fails and stays)
    let handle = start(&paths);
    let proxy = RemoteProxy::for_paths(&paths);
    for _ in 0..200 {
        if proxy.ping().is_ok() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let request_id = proxy
        .add_request("default", ReplayRequest::post("/api/todos", json!({"text": "buy milk"})))
        .unwrap();
    let meta = proxy.trigger_sync("default").unwrap();
    assert_eq!(meta.failed, 1);
    proxy.shutdown().unwrap();
    handle.join().unwrap().unwrap();

    // Second worker over the same state dir: exactly one live copy
    let handle = start(&paths);
    let proxy = RemoteProxy::for_paths(&paths);
    for _ in 0..200 {
        if proxy.ping().is_ok() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let entries = proxy.get_entries("default").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request_id, request_id);

    proxy.shutdown().unwrap();
    handle.join().unwrap().unwrap();
}
