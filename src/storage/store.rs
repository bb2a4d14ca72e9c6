//! Durable queue store.
//!
//! The store is the restart-surviving side of a queue: entries are pushed
//! when requests are queued, drained at the start of a replay cycle, and
//! removed only once an attempt has succeeded. The in-memory entry list a
//! queue exposes is a cache rebuilt from here.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::error::RequeueError;
use crate::sync::{EntryStatus, Method, QueueEntry, ReplayRequest};

/// Restart-surviving persistence for queued entries.
///
/// `pop_most_recent` yields the most recently enqueued entry first; callers
/// that need original enqueue order drain completely and reverse. No
/// ordering is guaranteed by `list_all`.
pub trait DurableStore: Send {
    /// Persist an entry. Re-pushing an entry with a known `request_id`
    /// overwrites the stored copy instead of duplicating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn push(&self, entry: &QueueEntry) -> Result<(), RequeueError>;

    /// Remove and return the most recently enqueued entry, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or delete fails.
    fn pop_most_recent(&self) -> Result<Option<QueueEntry>, RequeueError>;

    /// Return every stored entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_all(&self) -> Result<Vec<QueueEntry>, RequeueError>;

    /// Delete an entry by id. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, request_id: &str) -> Result<bool, RequeueError>;

    /// Delete every stored entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn clear(&self) -> Result<(), RequeueError>;
}

/// `SQLite`-backed store, scoped to one queue name.
pub struct SqliteStore {
    db: Database,
    queue_name: String,
}

impl SqliteStore {
    /// Create a store over an open database connection.
    #[must_use]
    pub fn new(db: Database, queue_name: impl Into<String>) -> Self {
        Self {
            db,
            queue_name: queue_name.into(),
        }
    }

    /// The queue name this store is scoped to.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

impl DurableStore for SqliteStore {
    fn push(&self, entry: &QueueEntry) -> Result<(), RequeueError> {
        let body = entry
            .request
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RequeueError::Database(format!("Failed to encode body: {e}")))?;

        self.db
            .connection()
            .execute(
                r"INSERT INTO queue_entries
                      (queue_name, request_id, method, target, body, enqueued_at, last_attempt_at)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                  ON CONFLICT(request_id) DO UPDATE SET
                      last_attempt_at = excluded.last_attempt_at",
                params![
                    self.queue_name,
                    entry.request_id,
                    entry.request.method.as_str(),
                    entry.request.target,
                    body,
                    entry.enqueued_at.to_rfc3339(),
                    entry.last_attempt_at.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| RequeueError::Database(format!("Failed to push entry: {e}")))?;

        Ok(())
    }

    fn pop_most_recent(&self) -> Result<Option<QueueEntry>, RequeueError> {
        let conn = self.db.connection();

        let entry = conn
            .query_row(
                r"SELECT request_id, method, target, body, enqueued_at, last_attempt_at
                  FROM queue_entries
                  WHERE queue_name = ?1
                  ORDER BY enqueued_at DESC, id DESC
                  LIMIT 1",
                [&self.queue_name],
                row_to_entry,
            )
            .optional()
            .map_err(|e| RequeueError::Database(format!("Failed to pop entry: {e}")))?;

        if let Some(entry) = &entry {
            conn.execute(
                "DELETE FROM queue_entries WHERE request_id = ?1",
                [&entry.request_id],
            )
            .map_err(|e| RequeueError::Database(format!("Failed to pop entry: {e}")))?;
        }

        Ok(entry)
    }

    fn list_all(&self) -> Result<Vec<QueueEntry>, RequeueError> {
        let conn = self.db.connection();

        let mut stmt = conn
            .prepare(
                r"SELECT request_id, method, target, body, enqueued_at, last_attempt_at
                  FROM queue_entries
                  WHERE queue_name = ?1
                  ORDER BY enqueued_at ASC, id ASC",
            )
            .map_err(|e| RequeueError::Database(format!("Failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([&self.queue_name], row_to_entry)
            .map_err(|e| RequeueError::Database(format!("Failed to list entries: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| RequeueError::Database(e.to_string()))?);
        }

        Ok(entries)
    }

    fn remove(&self, request_id: &str) -> Result<bool, RequeueError> {
        let rows = self
            .db
            .connection()
            .execute(
                "DELETE FROM queue_entries WHERE queue_name = ?1 AND request_id = ?2",
                params![self.queue_name, request_id],
            )
            .map_err(|e| RequeueError::Database(format!("Failed to remove entry: {e}")))?;

        Ok(rows > 0)
    }

    fn clear(&self) -> Result<(), RequeueError> {
        self.db
            .connection()
            .execute(
                "DELETE FROM queue_entries WHERE queue_name = ?1",
                [&self.queue_name],
            )
            .map_err(|e| RequeueError::Database(format!("Failed to clear queue: {e}")))?;

        Ok(())
    }
}

fn row_to_entry(row: &Row<'_>) -> Result<QueueEntry, rusqlite::Error> {
    let request_id: String = row.get(0)?;
    let method_str: String = row.get(1)?;
    let target: String = row.get(2)?;
    let body_str: Option<String> = row.get(3)?;
    let enqueued_at_str: String = row.get(4)?;
    let last_attempt_at_str: Option<String> = row.get(5)?;

    let body = body_str.and_then(|s| serde_json::from_str(&s).ok());

    let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at_str)
        .map_or_else(|_| Utc::now(), |t| t.with_timezone(&Utc));

    let last_attempt_at = last_attempt_at_str.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
    });

    Ok(QueueEntry {
        request_id,
        request: ReplayRequest {
            method: Method::parse(&method_str),
            target,
            body,
        },
        enqueued_at,
        last_attempt_at,
        status: EntryStatus::Standby,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn create_test_store() -> SqliteStore {
        let db = Database::open_in_memory().unwrap();
        SqliteStore::new(db, "default")
    }

    fn entry_at(target: &str, secs: i64) -> QueueEntry {
        let mut entry = QueueEntry::new(ReplayRequest::post(target, json!({"text": target})));
        entry.enqueued_at = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        entry
    }

    #[test]
    fn test_push_and_list() {
        let store = create_test_store();

        store.push(&entry_at("/api/todos", 0)).unwrap();
        store.push(&entry_at("/api/items", 1)).unwrap();

        let entries = store.list_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request.target, "/api/todos");
        assert_eq!(entries[0].request.method, Method::Post);
        assert_eq!(entries[0].request.body, Some(json!({"text": "/api/todos"})));
    }

    #[test]
    fn test_pop_is_most_recent_first() {
        let store = create_test_store();

        store.push(&entry_at("/first", 0)).unwrap();
        store.push(&entry_at("/second", 1)).unwrap();
        store.push(&entry_at("/third", 2)).unwrap();

        let popped = store.pop_most_recent().unwrap().unwrap();
        assert_eq!(popped.request.target, "/third");
        let popped = store.pop_most_recent().unwrap().unwrap();
        assert_eq!(popped.request.target, "/second");
        let popped = store.pop_most_recent().unwrap().unwrap();
        assert_eq!(popped.request.target, "/first");
        assert!(store.pop_most_recent().unwrap().is_none());
    }

    #[test]
    fn test_repush_does_not_duplicate() {
        let store = create_test_store();

        let entry = entry_at("/api/todos", 0);
        store.push(&entry).unwrap();
        store.push(&entry).unwrap();

        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = create_test_store();

        let entry = entry_at("/api/todos", 0);
        store.push(&entry).unwrap();

        assert!(store.remove(&entry.request_id).unwrap());
        assert!(!store.remove(&entry.request_id).unwrap());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_clear() {
        let store = create_test_store();

        store.push(&entry_at("/a", 0)).unwrap();
        store.push(&entry_at("/b", 1)).unwrap();
        store.clear().unwrap();

        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_queues_are_isolated() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let store_a = SqliteStore::new(Database::open_at(&db_path).unwrap(), "queue-a");
        let store_b = SqliteStore::new(Database::open_at(&db_path).unwrap(), "queue-b");

        store_a.push(&entry_at("/a", 0)).unwrap();

        assert_eq!(store_a.list_all().unwrap().len(), 1);
        assert!(store_b.list_all().unwrap().is_empty());
        assert!(store_b.pop_most_recent().unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let entry = entry_at("/api/todos", 0);
        {
            let store = SqliteStore::new(Database::open_at(&db_path).unwrap(), "default");
            store.push(&entry).unwrap();
        }

        let store = SqliteStore::new(Database::open_at(&db_path).unwrap(), "default");
        let entries = store.list_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_id, entry.request_id);
        assert_eq!(entries[0].status, EntryStatus::Standby);
    }
}
