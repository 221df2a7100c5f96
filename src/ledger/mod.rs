//! Persistent record of which items have been fully downloaded and tagged.
//!
//! The ledger is loaded once at startup, consulted before every download,
//! updated in memory after each success and written back once at the end of
//! the run. Two backends implement the same [`Ledger`] trait:
//! - [`JsonLedger`]: a hand-editable JSON object of `id -> recorded_at`
//! - [`SqliteLedger`]: an embedded SQLite file

pub mod error;
pub mod json;
pub mod schema;
pub mod sqlite;

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::types::LedgerBackend;

pub use error::LedgerError;
pub use json::JsonLedger;
pub use sqlite::SqliteLedger;

/// Key-value store of downloaded item ids.
///
/// Entries are never mutated once recorded; recording an id a second time
/// keeps the original timestamp.
pub trait Ledger: Send {
    fn contains(&self, id: &str) -> bool;

    /// Record `id` as downloaded at `at`. In memory only until [`Ledger::save`].
    fn record(&mut self, id: &str, at: DateTime<Utc>);

    /// Flush in-memory changes to storage. A no-op when nothing changed.
    fn save(&mut self) -> Result<(), LedgerError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, sorted by id.
    fn entries(&self) -> Vec<(String, DateTime<Utc>)>;

    /// Where this ledger lives on disk.
    fn location(&self) -> &Path;
}

/// Open (or create) the ledger at `path` with the given backend.
pub fn open(backend: LedgerBackend, path: &Path) -> Result<Box<dyn Ledger>, LedgerError> {
    match backend {
        LedgerBackend::Json => Ok(Box::new(JsonLedger::load(path)?)),
        LedgerBackend::Sqlite => Ok(Box::new(SqliteLedger::open(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn exercise(backend: LedgerBackend) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("ledger.{}", backend.extension()));

        let mut ledger = open(backend, &path).unwrap();
        assert!(ledger.is_empty());
        ledger.record("A", ts("2024-01-05T10:00:00Z"));
        ledger.record("B", ts("2024-01-06T10:00:00Z"));
        ledger.record("A", ts("2030-01-01T00:00:00Z"));
        ledger.save().unwrap();
        assert_eq!(ledger.location(), path.as_path());
        drop(ledger);

        let reopened = open(backend, &path).unwrap();
        assert_eq!(
            reopened.entries(),
            vec![
                ("A".to_string(), ts("2024-01-05T10:00:00Z")),
                ("B".to_string(), ts("2024-01-06T10:00:00Z")),
            ]
        );
    }

    #[test]
    fn test_json_backend_through_trait() {
        exercise(LedgerBackend::Json);
    }

    #[test]
    fn test_sqlite_backend_through_trait() {
        exercise(LedgerBackend::Sqlite);
    }
}
