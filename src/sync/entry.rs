//! Queue entry types.
//!
//! Defines the replayable request description, the live entry wrapper the
//! queue exposes to observers, and the per-cycle progress counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// HTTP method of a replayable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// The string representation used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Parse from a string, defaulting unknown values to POST.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            _ => Self::Post,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The serialized request description needed to re-issue an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub target: String,
    /// Optional JSON body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl ReplayRequest {
    /// Create a request with an explicit method.
    #[must_use]
    pub fn new(method: Method, target: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            method,
            target: target.into(),
            body,
        }
    }

    /// Create a POST request with a JSON body.
    #[must_use]
    pub fn post(target: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, target, Some(body))
    }

    /// Create a DELETE request with no body.
    #[must_use]
    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::Delete, target, None)
    }
}

/// Runtime state of a queued entry.
///
/// This is presentation state, not persisted identity: every entry read
/// back from the durable store is `Standby`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Durably stored, not targeted by a replay cycle.
    Standby,
    /// Popped from the store and currently being attempted.
    Pending,
    /// Attempted and failed during the current cycle; back to standby at
    /// the start of the next one.
    Finished,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Standby => "standby",
            Self::Pending => "pending",
            Self::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

/// One queued, not-yet-confirmed side-effecting action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Opaque unique identifier, stable for the entry's lifetime.
    pub request_id: String,
    /// The request to re-issue.
    pub request: ReplayRequest,
    /// When the entry was queued. Replay order relies on this.
    pub enqueued_at: DateTime<Utc>,
    /// When the entry was last touched by a replay cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Current runtime state.
    pub status: EntryStatus,
}

impl QueueEntry {
    /// Create a new standby entry with a freshly generated id.
    #[must_use]
    pub fn new(request: ReplayRequest) -> Self {
        let enqueued_at = Utc::now();
        Self {
            request_id: generate_request_id(&request.target, enqueued_at),
            request,
            enqueued_at,
            last_attempt_at: None,
            status: EntryStatus::Standby,
        }
    }
}

/// Generate an entry id from the request target and creation time.
///
/// The id is a hex-encoded SHA-256 digest, so collisions within a queue
/// are negligible even for repeated requests to the same target.
#[must_use]
pub fn generate_request_id(target: &str, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(target.as_bytes());
    hasher.update(at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Progress counters for one replay cycle.
///
/// `total` is fixed when the cycle drains the store; entries added while
/// the cycle runs do not retroactively increase it. `succeeded` and
/// `failed` only grow within a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Entries drained into this cycle.
    pub total: usize,
    /// Attempts that completed successfully.
    pub succeeded: usize,
    /// Attempts that failed and stay queued.
    pub failed: usize,
}

impl SyncMeta {
    /// Counters for a cycle that just drained `total` entries.
    #[must_use]
    pub const fn started(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Whether every drained entry has been settled.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.succeeded + self.failed == self.total
    }

    /// Entries settled so far.
    #[must_use]
    pub const fn done(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Whether the cycle finished without a single failure.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    /// Whether every attempt in the cycle failed.
    #[must_use]
    pub const fn all_failed(&self) -> bool {
        self.failed == self.total && self.total > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_method_roundtrip() {
        assert_eq!(Method::parse("delete"), Method::Delete);
        assert_eq!(Method::parse("GET"), Method::Get);
        assert_eq!(Method::Delete.as_str(), "DELETE");
        // Unknown methods fall back to POST
        assert_eq!(Method::parse("TRACE"), Method::Post);
    }

    #[test]
    fn test_new_entry_is_standby() {
        let entry = QueueEntry::new(ReplayRequest::post("/api/todos", json!({"text": "buy milk"})));
        assert_eq!(entry.status, EntryStatus::Standby);
        assert!(entry.last_attempt_at.is_none());
        assert_eq!(entry.request_id.len(), 64);
    }

    #[test]
    fn test_request_id_is_stable_and_distinct() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let later = Utc.timestamp_opt(1_700_000_001, 0).unwrap();

        assert_eq!(
            generate_request_id("/api/todos", at),
            generate_request_id("/api/todos", at)
        );
        assert_ne!(
            generate_request_id("/api/todos", at),
            generate_request_id("/api/todos", later)
        );
        assert_ne!(
            generate_request_id("/api/todos", at),
            generate_request_id("/api/items", at)
        );
    }

    #[test]
    fn test_meta_counters() {
        let mut meta = SyncMeta::started(2);
        assert!(!meta.is_complete());

        meta.succeeded += 1;
        meta.failed += 1;
        assert!(meta.is_complete());
        assert_eq!(meta.done(), 2);
        assert!(!meta.all_succeeded());
        assert!(!meta.all_failed());
    }

    #[test]
    fn test_empty_meta_is_complete() {
        let meta = SyncMeta::started(0);
        assert!(meta.is_complete());
        assert!(meta.all_succeeded());
        assert!(!meta.all_failed());
    }

    #[test]
    fn test_request_serialization_skips_empty_body() {
        let request = ReplayRequest::delete("/api/todos?ids=1");
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("body"));
        assert!(json.contains("\"DELETE\""));
    }
}
