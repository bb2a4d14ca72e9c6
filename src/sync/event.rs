//! Queue status events.
//!
//! Events are the payloads broadcast to observers while requests are
//! queued and replayed. Everything in an event is plain data so it can
//! cross the process boundary as-is; errors travel as message and kind
//! strings, never as live error values.

use serde::{Deserialize, Serialize};

use super::entry::{ReplayRequest, SyncMeta};

/// A serializable description of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Failure category, e.g. `connect` or `timeout`.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A status broadcast for one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum QueueEvent {
    /// A failed request was newly queued.
    #[serde(rename = "ADD")]
    Add {
        queue_name: String,
        request_id: String,
        request: ReplayRequest,
    },
    /// An entry's replay attempt is starting.
    #[serde(rename = "PENDING")]
    Pending {
        queue_name: String,
        meta: SyncMeta,
        request: ReplayRequest,
    },
    /// An entry was replayed successfully and removed from the queue.
    #[serde(rename = "SUCCESS")]
    Success {
        queue_name: String,
        meta: SyncMeta,
        request: ReplayRequest,
        /// Replayed response body.
        data: serde_json::Value,
        /// Whether the response body was written to the side cache.
        /// Absent when caching is not configured for the queue.
        #[serde(skip_serializing_if = "Option::is_none")]
        was_cached: Option<bool>,
    },
    /// An entry's replay attempt failed; the entry stays queued.
    #[serde(rename = "FAIL")]
    Fail {
        queue_name: String,
        meta: SyncMeta,
        request: ReplayRequest,
        error: ErrorInfo,
    },
    /// A replay cycle completed; `meta` holds the final counters.
    #[serde(rename = "SYNC_ENDED")]
    SyncEnded { queue_name: String, meta: SyncMeta },
}

impl QueueEvent {
    /// The queue this event belongs to.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        match self {
            Self::Add { queue_name, .. }
            | Self::Pending { queue_name, .. }
            | Self::Success { queue_name, .. }
            | Self::Fail { queue_name, .. }
            | Self::SyncEnded { queue_name, .. } => queue_name,
        }
    }

    /// The cycle counters carried by this event, if any.
    #[must_use]
    pub const fn meta(&self) -> Option<&SyncMeta> {
        match self {
            Self::Add { .. } => None,
            Self::Pending { meta, .. }
            | Self::Success { meta, .. }
            | Self::Fail { meta, .. }
            | Self::SyncEnded { meta, .. } => Some(meta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_tagging() {
        let event = QueueEvent::Add {
            queue_name: "default".to_string(),
            request_id: "abc".to_string(),
            request: ReplayRequest::post("/api/todos", json!({"text": "walk dog"})),
        };

        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["status"], "ADD");
        assert_eq!(encoded["queue_name"], "default");

        let decoded: QueueEvent = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_fail_event_roundtrip() {
        let event = QueueEvent::Fail {
            queue_name: "default".to_string(),
            meta: SyncMeta {
                total: 2,
                succeeded: 1,
                failed: 1,
            },
            request: ReplayRequest::delete("/api/todos?ids=2"),
            error: ErrorInfo {
                kind: "connect".to_string(),
                message: "connection refused".to_string(),
            },
        };

        let json = serde_json::to_string(&event).unwrap();
        let decoded: QueueEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.meta().unwrap().failed, 1);
    }

    #[test]
    fn test_queue_name_accessor() {
        let event = QueueEvent::SyncEnded {
            queue_name: "todo-post-queue".to_string(),
            meta: SyncMeta::started(0),
        };
        assert_eq!(event.queue_name(), "todo-post-queue");
    }
}
