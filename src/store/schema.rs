use std::path::Path;

use anyhow::{bail, Context, Result};
use log::warn;
use rusqlite::Connection;

/// Stored in `PRAGMA user_version` once the tables exist.
const SCHEMA_VERSION: i32 = 1;

/// Opens the replay database at `path`, creating its tables on first use.
pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open replay database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Replay database stays in rollback-journal mode: {err}");
    }
    // Deleting a session relies on cascades to clear its frames and events.
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    bootstrap(&conn)?;
    Ok(conn)
}

/// Creates the session, frame and event tables on an empty database.
/// Refuses files written by a newer schema.
pub fn bootstrap(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read schema version")?;

    match version {
        0 => conn
            .execute_batch(&format!(
                "BEGIN;\n{}\nPRAGMA user_version = {SCHEMA_VERSION};\nCOMMIT;",
                include_str!("schema.sql")
            ))
            .context("failed to create replay tables"),
        SCHEMA_VERSION => Ok(()),
        newer => bail!(
            "replay database uses schema {newer}, this build understands up to {SCHEMA_VERSION}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[test]
    fn bootstrap_creates_tables_once() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        bootstrap(&conn).unwrap();

        assert_eq!(table_names(&conn), vec!["events", "frames", "sessions"]);
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn refuses_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let err = bootstrap(&conn).unwrap_err();
        assert!(err.to_string().contains("schema 2"));
    }

    #[test]
    fn connect_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.db");
        let conn = connect(&path).unwrap();
        assert!(path.exists());

        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
