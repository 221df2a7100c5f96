//! Embedded SQLite ledger.
//!
//! All rows are read into memory on open so lookups during a sync never hit
//! the database; new records are buffered and written in one transaction by
//! [`Ledger::save`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use super::error::LedgerError;
use super::schema;
use super::Ledger;

pub struct SqliteLedger {
    conn: Connection,
    path: PathBuf,
    entries: BTreeMap<String, DateTime<Utc>>,
    pending: Vec<String>,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// Open or create a ledger database at the given path.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(|source| LedgerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, path.to_path_buf())
    }

    /// Open an in-memory ledger (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(|source| LedgerError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self, LedgerError> {
        schema::migrate(&conn)?;
        let entries = load_entries(&conn)?;
        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "Ledger database opened"
        );
        Ok(Self {
            conn,
            path,
            entries,
            pending: Vec::new(),
        })
    }
}

fn load_entries(conn: &Connection) -> Result<BTreeMap<String, DateTime<Utc>>, LedgerError> {
    let mut stmt = conn.prepare("SELECT id, recorded_at FROM downloaded_items")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, raw)| match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Ok((id, at.with_timezone(&Utc))),
            Err(_) => Err(LedgerError::InvalidTimestamp { id, value: raw }),
        })
        .collect()
}

impl Ledger for SqliteLedger {
    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn record(&mut self, id: &str, at: DateTime<Utc>) {
        if !self.entries.contains_key(id) {
            self.entries.insert(id.to_string(), at);
            self.pending.push(id.to_string());
        }
    }

    fn save(&mut self) -> Result<(), LedgerError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO downloaded_items (id, recorded_at) VALUES (?1, ?2)",
            )?;
            for id in &self.pending {
                if let Some(at) = self.entries.get(id) {
                    stmt.execute(rusqlite::params![
                        id,
                        at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
                    ])?;
                }
            }
        }
        tx.commit()?;
        tracing::debug!(
            path = %self.path.display(),
            written = self.pending.len(),
            "Ledger saved"
        );
        self.pending.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        self.entries
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect()
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_in_memory_starts_empty() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.location(), Path::new(":memory:"));
    }

    #[test]
    fn test_unsaved_records_are_visible_in_memory() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.record("A", ts("2024-01-01T00:00:00Z"));
        assert!(ledger.contains("A"));
        let rows: i64 = ledger
            .conn
            .query_row("SELECT COUNT(*) FROM downloaded_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_save_writes_pending_rows() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.record("A", ts("2024-01-01T00:00:00.5Z"));
        ledger.record("B", ts("2024-01-02T00:00:00Z"));
        ledger.save().unwrap();
        assert!(ledger.pending.is_empty());

        let reloaded = load_entries(&ledger.conn).unwrap();
        assert_eq!(reloaded.get("A"), Some(&ts("2024-01-01T00:00:00.5Z")));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");
        let mut ledger = SqliteLedger::open(&path).unwrap();
        ledger.record("X", ts("2024-05-05T05:05:05Z"));
        ledger.save().unwrap();
        drop(ledger);

        let reopened = SqliteLedger::open(&path).unwrap();
        assert_eq!(
            reopened.entries(),
            vec![("X".to_string(), ts("2024-05-05T05:05:05Z"))]
        );
    }

    #[test]
    fn test_invalid_timestamp_row_is_error() {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO downloaded_items (id, recorded_at) VALUES ('A', 'yesterday')",
            [],
        )
        .unwrap();
        assert!(matches!(
            load_entries(&conn),
            Err(LedgerError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_non_database_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        std::fs::write(&path, "not a database\n".repeat(512)).unwrap();
        assert!(SqliteLedger::open(&path).is_err());
    }
}
