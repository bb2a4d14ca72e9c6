//! Live replay progress command.
//!
//! Subscribes to a queue's broadcast stream and renders each status
//! change as it arrives.

use std::sync::mpsc;
use std::sync::Mutex;

use colored::Colorize;

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::error::RequeueError;
use crate::remote::RemoteProxy;
use crate::sync::QueueEvent;

/// Follow a queue's events until interrupted (or, with `once`, until the
/// next completed replay cycle).
///
/// # Errors
///
/// Returns an error if the worker is unreachable or the queue is unknown.
pub fn watch(queue: &str, once: bool, format: OutputFormat) -> Result<String, RequeueError> {
    let proxy = RemoteProxy::for_paths(&Paths::new()?);

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let handle = proxy.on_queue_event(queue, move |event| {
        if let Ok(tx) = tx.lock() {
            let _ = tx.send(event.clone());
        }
    })?;

    if format == OutputFormat::Pretty {
        eprintln!("Watching queue \"{queue}\" (Ctrl-C to stop)");
    }

    for event in rx {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&event)?),
            OutputFormat::Pretty => println!("{}", render_event(&event)),
        }

        if once && matches!(event, QueueEvent::SyncEnded { .. }) {
            break;
        }
    }

    proxy.off(&handle);
    Ok(String::new())
}

/// Render one event as a progress line.
fn render_event(event: &QueueEvent) -> String {
    match event {
        QueueEvent::Add {
            request_id,
            request,
            ..
        } => format!(
            "{} queued {} ({})",
            "+".bold(),
            request.target,
            &request_id[..12.min(request_id.len())]
        ),
        QueueEvent::Pending { meta, request, .. } => format!(
            "{} replaying {} [{}/{}]",
            "…".dimmed(),
            request.target,
            meta.done() + 1,
            meta.total
        ),
        QueueEvent::Success { meta, request, .. } => format!(
            "{} {} [{}/{}]",
            "✓".green(),
            request.target,
            meta.done(),
            meta.total
        ),
        QueueEvent::Fail {
            meta,
            request,
            error,
            ..
        } => format!(
            "{} {} [{}/{}]: {}",
            "✗".red(),
            request.target,
            meta.done(),
            meta.total,
            error.to_string().red()
        ),
        QueueEvent::SyncEnded { meta, .. } => {
            if meta.total == 0 {
                "Nothing to replay.".dimmed().to_string()
            } else if meta.all_succeeded() {
                format!("Replay finished: all {} requests fulfilled", meta.total)
                    .green()
                    .to_string()
            } else if meta.all_failed() {
                format!("Replay failed: 0/{} requests fulfilled", meta.total)
                    .red()
                    .to_string()
            } else {
                format!(
                    "Replay ended: {}/{} requests fulfilled",
                    meta.succeeded, meta.total
                )
                .yellow()
                .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ErrorInfo, ReplayRequest, SyncMeta};
    use serde_json::json;

    #[test]
    fn test_render_cycle_end_variants() {
        let all_ok = QueueEvent::SyncEnded {
            queue_name: "q".to_string(),
            meta: SyncMeta {
                total: 2,
                succeeded: 2,
                failed: 0,
            },
        };
        assert!(render_event(&all_ok).contains("all 2 requests"));

        let all_failed = QueueEvent::SyncEnded {
            queue_name: "q".to_string(),
            meta: SyncMeta {
                total: 2,
                succeeded: 0,
                failed: 2,
            },
        };
        assert!(render_event(&all_failed).contains("0/2"));

        let partial = QueueEvent::SyncEnded {
            queue_name: "q".to_string(),
            meta: SyncMeta {
                total: 3,
                succeeded: 2,
                failed: 1,
            },
        };
        assert!(render_event(&partial).contains("2/3"));

        let empty = QueueEvent::SyncEnded {
            queue_name: "q".to_string(),
            meta: SyncMeta::started(0),
        };
        assert!(render_event(&empty).contains("Nothing to replay"));
    }

    #[test]
    fn test_render_fail_includes_error() {
        let event = QueueEvent::Fail {
            queue_name: "q".to_string(),
            meta: SyncMeta {
                total: 1,
                succeeded: 0,
                failed: 1,
            },
            request: ReplayRequest::post("/api/todos", json!({})),
            error: ErrorInfo {
                kind: "connect".to_string(),
                message: "connection refused".to_string(),
            },
        };

        let line = render_event(&event);
        assert!(line.contains("/api/todos"));
        assert!(line.contains("connection refused"));
    }
}
