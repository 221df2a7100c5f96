use thiserror::Error;

use crate::catalog::CatalogError;
use crate::ledger::LedgerError;
use crate::tagger::TagError;

/// Failure of a single item. Logged and counted; the run carries on and the
/// item stays out of the ledger so the next run picks it up again.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("no download URL in catalog record")]
    NoSource,

    #[error("HTTP error {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("HTTP error downloading {url} (bytes_so_far={bytes_written}): {source}")]
    Http {
        url: String,
        bytes_written: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("Tagging failed: {0}")]
    Tag(#[from] TagError),
}

impl ItemError {
    /// Tag failures leave a complete, untagged file on disk.
    pub fn is_tag_failure(&self) -> bool {
        matches!(self, ItemError::Tag(_))
    }
}

/// Failures that end the run. The ledger has been saved by the time one of
/// these reaches the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch page {page}: {source}")]
    Catalog {
        page: u32,
        #[source]
        source: CatalogError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Reached the page limit of {max_pages} before the catalog was exhausted")]
    PageLimit { max_pages: u32 },

    #[error("Sync interrupted by shutdown signal")]
    Interrupted,
}
