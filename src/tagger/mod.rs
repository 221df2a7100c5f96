//! Embedding capture time and location into downloaded files.
//!
//! The sync engine only sees the [`Tagger`] trait. [`ExifToolTagger`] shells
//! out to `exiftool`; [`LittleExifTagger`] writes the tags in-process.

pub mod exiftool;
pub mod little;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::types::TaggerKind;

pub use exiftool::ExifToolTagger;
pub use little::LittleExifTagger;

/// EXIF wall-clock format (`YYYY:MM:DD HH:MM:SS`).
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },

    #[error("Failed to write metadata to {path}: {message}")]
    Write { path: String, message: String },

    #[error("Tagging task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A signed decimal-degree position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn latitude_ref(&self) -> &'static str {
        if self.latitude < 0.0 {
            "S"
        } else {
            "N"
        }
    }

    pub fn longitude_ref(&self) -> &'static str {
        if self.longitude < 0.0 {
            "W"
        } else {
            "E"
        }
    }
}

/// Capability that stamps a file with its capture time and position.
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag_file(
        &self,
        path: &Path,
        taken_at: DateTime<FixedOffset>,
        coords: Option<Coordinates>,
    ) -> Result<(), TagError>;
}

/// Wall-clock capture time in the item's own offset.
pub fn exif_datetime(taken_at: &DateTime<FixedOffset>) -> String {
    taken_at.format(EXIF_DATETIME_FORMAT).to_string()
}

/// UTC offset in EXIF `OffsetTime*` form, e.g. `+02:00`.
pub fn exif_offset(taken_at: &DateTime<FixedOffset>) -> String {
    taken_at.format("%:z").to_string()
}

pub fn build(kind: TaggerKind, exiftool_path: &Path) -> Box<dyn Tagger> {
    match kind {
        TaggerKind::ExifTool => Box::new(ExifToolTagger::new(exiftool_path)),
        TaggerKind::LittleExif => Box::new(LittleExifTagger),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exif_datetime_keeps_original_offset_wall_clock() {
        let t = DateTime::parse_from_rfc3339("2024-06-01T08:15:30.250+02:00").unwrap();
        assert_eq!(exif_datetime(&t), "2024:06:01 08:15:30");
        assert_eq!(exif_offset(&t), "+02:00");
    }

    #[test]
    fn test_exif_offset_utc() {
        let t = DateTime::parse_from_rfc3339("2024-01-05T10:00:00Z").unwrap();
        assert_eq!(exif_offset(&t), "+00:00");
    }

    #[test]
    fn test_reference_letters() {
        let c = Coordinates {
            latitude: -33.86,
            longitude: 151.2,
        };
        assert_eq!(c.latitude_ref(), "S");
        assert_eq!(c.longitude_ref(), "E");
        let c = Coordinates {
            latitude: 51.5,
            longitude: -0.12,
        };
        assert_eq!(c.latitude_ref(), "N");
        assert_eq!(c.longitude_ref(), "W");
    }
}
