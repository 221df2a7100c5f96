//! Error types for the download ledger.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or persisting the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger file exists but could not be read.
    #[error("Failed to read ledger at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The ledger file exists but does not hold a valid id→timestamp map.
    #[error("Corrupt ledger at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Writing or renaming the ledger file failed.
    #[error("Failed to write ledger at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Failed to open or create the SQLite database file.
    #[error("Failed to open ledger database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Ledger database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database schema version is newer than supported.
    #[error("Ledger schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },

    #[error("Invalid timestamp {value:?} recorded for {id}")]
    InvalidTimestamp { id: String, value: String },
}
