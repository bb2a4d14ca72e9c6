//! Database migrations for requeue.
//!
//! Each migration is a function that upgrades the schema by one version.
//! Migrations are run automatically when the database is opened.

use rusqlite::Connection;

use crate::error::RequeueError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 if no version has been set (new database).
pub fn get_version(conn: &Connection) -> Result<i32, RequeueError> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| RequeueError::Database(format!("Failed to get schema version: {e}")))?;

    Ok(version)
}

/// Set the schema version in the database.
fn set_version(conn: &Connection, version: i32) -> Result<(), RequeueError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| RequeueError::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), RequeueError> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

/// Run a specific migration.
fn run_migration(conn: &Connection, version: i32) -> Result<(), RequeueError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(RequeueError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Creates the `queue_entries` table: one row per durably queued request.
/// Entry status is runtime state and is intentionally not persisted; every
/// stored row is a standby entry after a restart.
fn migrate_v1(conn: &Connection) -> Result<(), RequeueError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS queue_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue_name TEXT NOT NULL,
            request_id TEXT NOT NULL UNIQUE,
            method TEXT NOT NULL,
            target TEXT NOT NULL,
            body TEXT,
            enqueued_at TEXT NOT NULL,
            last_attempt_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_queue_entries_queue
        ON queue_entries(queue_name, enqueued_at);
        ",
    )
    .map_err(|e| RequeueError::Database(format!("Migration v1 failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_v1() {
        let conn = Connection::open_in_memory().unwrap();

        run(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);

        // Verify the table exists by inserting data
        conn.execute(
            "INSERT INTO queue_entries (queue_name, request_id, method, target, body, enqueued_at)
             VALUES ('default', 'abc123', 'POST', '/api/todos', '{\"text\":\"buy milk\"}',
                     '2026-01-01T10:00:00Z')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_migration_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run(&conn).unwrap();
        run(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_get_version_new_database() {
        let conn = Connection::open_in_memory().unwrap();

        assert_eq!(get_version(&conn).unwrap(), 0);
    }
}
