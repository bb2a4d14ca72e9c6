//! Output formatting for requeue.
//!
//! This module provides formatters for displaying queue state in pretty
//! (colored, human-readable) and JSON forms.

use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use crate::cli::args::OutputFormat;
use crate::error::RequeueError;
use crate::sync::{EntryStatus, QueueEntry, SyncMeta};

/// Generic JSON formatter for any serializable type.
///
/// # Errors
///
/// Returns `RequeueError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, RequeueError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Format a queue's entries based on output format.
///
/// # Errors
///
/// Returns `RequeueError::Parse` if JSON serialization fails.
pub fn format_entries(
    entries: &[QueueEntry],
    queue_name: &str,
    format: OutputFormat,
) -> Result<String, RequeueError> {
    match format {
        OutputFormat::Pretty => Ok(format_entries_pretty(entries, queue_name)),
        OutputFormat::Json => to_json(&json!({
            "queue": queue_name,
            "count": entries.len(),
            "entries": entries,
        })),
    }
}

/// Format a queue's entries as a table.
#[must_use]
pub fn format_entries_pretty(entries: &[QueueEntry], queue_name: &str) -> String {
    if entries.is_empty() {
        return format!("Queue \"{queue_name}\" is empty.");
    }

    let mut lines = Vec::new();

    lines.push(format!("Queue \"{queue_name}\" ({})", entries.len()));
    lines.push("─".repeat(72).to_string());
    lines.push(format!(
        "{:<14} {:<7} {:<32} {:<17} {}",
        "ID", "Method", "Target", "Enqueued", "Status"
    ));
    lines.push("─".repeat(72).to_string());

    for entry in entries {
        let short_id = entry.request_id.chars().take(12).collect::<String>();
        let enqueued = entry.enqueued_at.format("%Y-%m-%d %H:%M").to_string();
        let status = match entry.status {
            EntryStatus::Standby => "standby".dimmed().to_string(),
            EntryStatus::Pending => "pending".yellow().to_string(),
            EntryStatus::Finished => "failed".red().to_string(),
        };

        let target = if entry.request.target.len() > 32 {
            format!("{}…", &entry.request.target[..31])
        } else {
            entry.request.target.clone()
        };

        lines.push(format!(
            "{:<14} {:<7} {:<32} {:<17} {}",
            short_id, entry.request.method, target, enqueued, status
        ));
    }

    lines.join("\n")
}

/// Format a queue status summary based on output format.
///
/// # Errors
///
/// Returns `RequeueError::Parse` if JSON serialization fails.
pub fn format_status(
    entries: &[QueueEntry],
    queue_name: &str,
    format: OutputFormat,
) -> Result<String, RequeueError> {
    let standby = entries
        .iter()
        .filter(|e| e.status == EntryStatus::Standby)
        .count();
    let pending = entries
        .iter()
        .filter(|e| e.status == EntryStatus::Pending)
        .count();
    let oldest = entries.iter().map(|e| e.enqueued_at).min();

    match format {
        OutputFormat::Json => to_json(&json!({
            "queue": queue_name,
            "total": entries.len(),
            "standby": standby,
            "pending": pending,
            "oldest": oldest.map(|t| t.to_rfc3339()),
        })),
        OutputFormat::Pretty => {
            let mut lines = Vec::new();

            lines.push(format!("Queue \"{queue_name}\"").bold().to_string());
            lines.push("─".repeat(40).to_string());
            lines.push(format!(
                "  Queued:   {} {}",
                entries.len(),
                if entries.is_empty() {
                    String::new().normal()
                } else {
                    "requests waiting for replay".dimmed()
                }
            ));
            lines.push(format!("  Standby:  {standby}"));
            lines.push(format!("  Pending:  {pending}"));

            if let Some(oldest) = oldest {
                let age = chrono::Utc::now().signed_duration_since(oldest);
                let age_str = if age.num_hours() > 0 {
                    format!("{} hours ago", age.num_hours())
                } else if age.num_minutes() > 0 {
                    format!("{} minutes ago", age.num_minutes())
                } else {
                    "just now".to_string()
                };
                lines.push(format!("  Oldest:   {}", age_str.dimmed()));
            }

            if !entries.is_empty() {
                lines.push(String::new());
                lines.push(
                    "Run 'requeue sync' to replay queued requests"
                        .dimmed()
                        .to_string(),
                );
            }

            Ok(lines.join("\n"))
        }
    }
}

/// Format a completed replay cycle based on output format.
///
/// # Errors
///
/// Returns `RequeueError::Parse` if JSON serialization fails.
pub fn format_sync_result(meta: &SyncMeta, format: OutputFormat) -> Result<String, RequeueError> {
    match format {
        OutputFormat::Json => to_json(meta),
        OutputFormat::Pretty => {
            if meta.total == 0 {
                return Ok("No queued requests to replay.".to_string());
            }
            Ok(format_sync_result_pretty(meta))
        }
    }
}

/// Format a completed replay cycle for display.
#[must_use]
pub fn format_sync_result_pretty(meta: &SyncMeta) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Replay completed: {} requests", meta.total));
    lines.push("─".repeat(40));

    if meta.succeeded > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} succeeded", meta.succeeded).green()
        ));
    }

    if meta.failed > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} failed and stay queued", meta.failed).red()
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ReplayRequest;
    use serde_json::json;

    fn make_entry(target: &str) -> QueueEntry {
        QueueEntry::new(ReplayRequest::post(target, json!({"text": "buy milk"})))
    }

    #[test]
    fn test_format_entries_empty() {
        let result = format_entries(&[], "default", OutputFormat::Pretty).unwrap();
        assert!(result.contains("empty"));
    }

    #[test]
    fn test_format_entries_pretty_lists_targets() {
        let entries = vec![make_entry("/api/todos"), make_entry("/api/items")];
        let result = format_entries_pretty(&entries, "default");

        assert!(result.contains("Queue \"default\" (2)"));
        assert!(result.contains("/api/todos"));
        assert!(result.contains("/api/items"));
        assert!(result.contains("POST"));
    }

    #[test]
    fn test_format_entries_json_shape() {
        let entries = vec![make_entry("/api/todos")];
        let result = format_entries(&entries, "default", OutputFormat::Json).unwrap();

        assert!(result.contains("\"queue\": \"default\""));
        assert!(result.contains("\"count\": 1"));
        assert!(result.contains("\"target\": \"/api/todos\""));
    }

    #[test]
    fn test_format_status_counts() {
        let entries = vec![make_entry("/a"), make_entry("/b")];
        let result = format_status(&entries, "default", OutputFormat::Json).unwrap();

        assert!(result.contains("\"total\": 2"));
        assert!(result.contains("\"standby\": 2"));
        assert!(result.contains("\"pending\": 0"));
    }

    #[test]
    fn test_format_sync_result_mixed() {
        let meta = SyncMeta {
            total: 3,
            succeeded: 2,
            failed: 1,
        };
        let result = format_sync_result_pretty(&meta);

        assert!(result.contains("3 requests"));
        assert!(result.contains("2 succeeded"));
        assert!(result.contains("1 failed"));
    }

    #[test]
    fn test_format_sync_result_empty_cycle() {
        let meta = SyncMeta::started(0);
        let result = format_sync_result(&meta, OutputFormat::Pretty).unwrap();
        assert_eq!(result, "No queued requests to replay.");
    }
}
