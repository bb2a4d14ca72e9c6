//! Worker process lifecycle commands.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::api::{HttpTransport, ReplayTransport};
use crate::cli::args::OutputFormat;
use crate::config::{Config, Paths};
use crate::error::RequeueError;
use crate::output::to_json;
use crate::remote::{RemoteProxy, WorkerServer};
use crate::storage::{Database, SqliteStore};
use crate::sync::{
    NotificationBus, QueueRegistry, ReplayPolicy, ResponseCache, SyncCoordinator,
};

/// Run the worker in the foreground until asked to shut down.
///
/// Registers one queue per configuration entry, binds the control socket,
/// and replays non-empty queues automatically on the configured interval.
///
/// # Errors
///
/// Returns an error if another worker is running, the configuration is
/// invalid, or the socket cannot be bound.
pub fn worker_run() -> Result<String, RequeueError> {
    let paths = Paths::new()?;
    paths.ensure_dirs()?;
    setup_logging(&paths);

    let config = Config::load_from(&paths)?;
    if config.queues.is_empty() {
        return Err(RequeueError::Config(
            "no queues configured; add at least one under 'queues:'".to_string(),
        ));
    }

    let transport: Arc<dyn ReplayTransport> = Arc::new(HttpTransport::new(
        Duration::from_secs(config.worker.request_timeout_secs),
    )?);

    let bus = Arc::new(NotificationBus::new());
    let registry = Arc::new(QueueRegistry::new());

    for queue in &config.queues {
        let store = Box::new(SqliteStore::new(
            Database::open_at(&paths.database)?,
            queue.name.clone(),
        ));

        let policy = queue.parallel_interval_ms.map_or(
            ReplayPolicy::Sequential,
            |ms| ReplayPolicy::RateLimited {
                interval: Duration::from_millis(ms),
            },
        );

        let cache = queue
            .cache_responses
            .then(|| ResponseCache::new(paths.cache.join(&queue.name)));

        let coordinator = SyncCoordinator::new(
            queue.name.clone(),
            store,
            Arc::clone(&transport),
            policy,
            Arc::clone(&bus),
            cache,
        )?;

        tracing::info!(queue = %queue.name, ?policy, "queue registered");
        registry.register(coordinator);
    }

    let auto_sync = (config.worker.auto_sync_secs > 0)
        .then(|| Duration::from_secs(config.worker.auto_sync_secs));

    WorkerServer::new(registry, bus, paths, auto_sync).run()?;
    Ok(String::new())
}

/// Ask a running worker to shut down.
///
/// # Errors
///
/// Returns an error if no worker is reachable.
pub fn worker_stop(format: OutputFormat) -> Result<String, RequeueError> {
    let proxy = RemoteProxy::for_paths(&Paths::new()?);
    proxy.shutdown()?;

    match format {
        OutputFormat::Json => to_json(&json!({"stopped": true})),
        OutputFormat::Pretty => Ok("Worker stopped.".to_string()),
    }
}

/// Report whether a worker is running.
///
/// # Errors
///
/// Returns an error only if paths cannot be resolved; an unreachable
/// worker is reported, not an error.
pub fn worker_status(format: OutputFormat) -> Result<String, RequeueError> {
    let paths = Paths::new()?;
    let proxy = RemoteProxy::for_paths(&paths);
    let running = proxy.ping().is_ok();

    match format {
        OutputFormat::Json => to_json(&json!({"running": running})),
        OutputFormat::Pretty => {
            if running {
                let pid = std::fs::read_to_string(&paths.pid_file).unwrap_or_default();
                let pid = pid.trim();
                if pid.is_empty() {
                    Ok("Worker is running.".to_string())
                } else {
                    Ok(format!("Worker is running (pid {pid})."))
                }
            } else {
                Ok("Worker is not running.".to_string())
            }
        }
    }
}

/// Log to the worker log file, falling back to stderr.
fn setup_logging(paths: &Paths) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_file)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
