//! Flat-file JSON ledger.
//!
//! On disk this is a single JSON object mapping item id to the RFC 3339 time
//! it was recorded. The file is safe to hand-edit, and deleting it forces a
//! full re-sync.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::error::LedgerError;
use super::Ledger;

#[derive(Debug)]
pub struct JsonLedger {
    path: PathBuf,
    entries: BTreeMap<String, DateTime<Utc>>,
    dirty: bool,
}

impl JsonLedger {
    /// Load the ledger at `path`.
    ///
    /// A missing or blank file yields an empty ledger. A file that exists
    /// but can't be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let entries = match fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| LedgerError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No ledger yet, starting empty");
                BTreeMap::new()
            }
            Err(source) => {
                return Err(LedgerError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    /// Sibling temp file so the final rename stays on one filesystem.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl Ledger for JsonLedger {
    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn record(&mut self, id: &str, at: DateTime<Utc>) {
        if !self.entries.contains_key(id) {
            self.entries.insert(id.to_string(), at);
            self.dirty = true;
        }
    }

    fn save(&mut self) -> Result<(), LedgerError> {
        if !self.dirty {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&self.entries).map_err(LedgerError::Serialize)?;
        self.write_atomically(&bytes)
            .map_err(|source| LedgerError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.dirty = false;
        tracing::debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "Ledger saved"
        );
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
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonLedger::load(&dir.path().join("nope.json")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_blank_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.json");
        fs::write(&path, "  \n").unwrap();
        assert!(JsonLedger::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonLedger::load(&path),
            Err(LedgerError::Parse { .. })
        ));
    }

    #[test]
    fn test_directory_in_place_of_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            JsonLedger::load(dir.path()),
            Err(LedgerError::Read { .. })
        ));
    }

    #[test]
    fn test_round_trip_preserves_subsecond_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let at = ts("2024-02-29T12:34:56.789123456Z");

        let mut ledger = JsonLedger::load(&path).unwrap();
        ledger.record("img-1", at);
        ledger.save().unwrap();

        let loaded = JsonLedger::load(&path).unwrap();
        assert_eq!(loaded.entries(), vec![("img-1".to_string(), at)]);
    }

    #[test]
    fn test_file_is_plain_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = JsonLedger::load(&path).unwrap();
        ledger.record("B", ts("2024-01-05T10:00:00Z"));
        ledger.save().unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["B"], "2024-01-05T10:00:00Z");
    }

    #[test]
    fn test_hand_edited_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, r#"{"X": "2023-12-31T23:00:00+01:00"}"#).unwrap();
        let ledger = JsonLedger::load(&path).unwrap();
        assert!(ledger.contains("X"));
        assert_eq!(ledger.entries()[0].1, ts("2023-12-31T22:00:00Z"));
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = JsonLedger::load(&dir.path().join("l.json")).unwrap();
        ledger.record("A", ts("2024-01-01T00:00:00Z"));
        ledger.record("A", ts("2025-01-01T00:00:00Z"));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].1, ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_clean_save_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.json");
        let mut ledger = JsonLedger::load(&path).unwrap();
        ledger.save().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("l.json");
        let mut ledger = JsonLedger::load(&path).unwrap();
        ledger.record("A", ts("2024-01-01T00:00:00Z"));
        ledger.save().unwrap();
        assert!(path.exists());
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_failed_save_keeps_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.json");
        let mut ledger = JsonLedger::load(&path).unwrap();
        ledger.record("A", ts("2024-01-01T00:00:00Z"));
        ledger.save().unwrap();

        // A directory squatting on the temp name makes the next write fail.
        let mut second = JsonLedger::load(&path).unwrap();
        fs::create_dir(second.temp_path()).unwrap();
        second.record("B", ts("2024-01-02T00:00:00Z"));
        assert!(matches!(second.save(), Err(LedgerError::Write { .. })));

        let reloaded = JsonLedger::load(&path).unwrap();
        assert!(reloaded.contains("A"));
        assert!(!reloaded.contains("B"));
    }
}
