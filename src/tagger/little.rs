use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;

use super::{exif_datetime, exif_offset, Coordinates, TagError, Tagger};

/// Writes EXIF tags in-process with `little_exif`; no external tools needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LittleExifTagger;

const SECOND_FRACTIONS: u64 = 10_000;

/// Split decimal degrees into EXIF degree/minute/second rationals.
///
/// Rounding happens once, on the total in ten-thousandths of a second, so
/// seconds and minutes always stay below 60.
pub(crate) fn to_dms(value: f64) -> [(u32, u32); 3] {
    let total = (value.abs() * 3600.0 * SECOND_FRACTIONS as f64).round() as u64;
    let per_minute = 60 * SECOND_FRACTIONS;
    let per_degree = 60 * per_minute;
    [
        ((total / per_degree) as u32, 1),
        ((total % per_degree / per_minute) as u32, 1),
        ((total % per_minute) as u32, SECOND_FRACTIONS as u32),
    ]
}

fn rationals(value: f64) -> Vec<uR64> {
    to_dms(value)
        .into_iter()
        .map(|(nominator, denominator)| uR64 {
            nominator,
            denominator,
        })
        .collect()
}

fn write_tags(
    path: &Path,
    taken_at: &DateTime<FixedOffset>,
    coords: Option<Coordinates>,
) -> Result<(), TagError> {
    let write_err = |e: &dyn std::fmt::Display| TagError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    // Reading fails on images without an EXIF segment; writing still works.
    let mut metadata = Metadata::new_from_path(path).unwrap_or_else(|e| {
        tracing::debug!(path = %path.display(), error = %e, "No readable EXIF, starting empty");
        Metadata::new()
    });
    for tag in capture_tags(taken_at, coords) {
        metadata.set_tag(tag);
    }
    metadata.write_to_file(path).map_err(|e| write_err(&e))?;
    Ok(())
}

/// The same fields the exiftool backend writes.
fn capture_tags(taken_at: &DateTime<FixedOffset>, coords: Option<Coordinates>) -> Vec<ExifTag> {
    let datetime = exif_datetime(taken_at);
    let offset = exif_offset(taken_at);
    let mut tags = vec![
        ExifTag::DateTimeOriginal(datetime.clone()),
        ExifTag::CreateDate(datetime.clone()),
        ExifTag::ModifyDate(datetime),
        ExifTag::OffsetTimeOriginal(offset.clone()),
        ExifTag::OffsetTime(offset),
    ];
    if let Some(c) = coords {
        tags.push(ExifTag::GPSLatitudeRef(c.latitude_ref().to_string()));
        tags.push(ExifTag::GPSLatitude(rationals(c.latitude)));
        tags.push(ExifTag::GPSLongitudeRef(c.longitude_ref().to_string()));
        tags.push(ExifTag::GPSLongitude(rationals(c.longitude)));
    }
    tags
}

#[async_trait]
impl Tagger for LittleExifTagger {
    async fn tag_file(
        &self,
        path: &Path,
        taken_at: DateTime<FixedOffset>,
        coords: Option<Coordinates>,
    ) -> Result<(), TagError> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_tags(&owned, &taken_at, coords)).await??;
        tracing::debug!(path = %path.display(), "Wrote EXIF metadata");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_dms() {
        // 51°30'26.4" N
        let dms = to_dms(51.5073);
        assert_eq!(dms[0], (51, 1));
        assert_eq!(dms[1], (30, 1));
        assert_eq!(dms[2].1, 10_000);
        let seconds = dms[2].0 as f64 / 10_000.0;
        assert!((seconds - 26.28).abs() < 0.01);
    }

    #[test]
    fn test_to_dms_ignores_sign() {
        assert_eq!(to_dms(-0.5), to_dms(0.5));
        assert_eq!(to_dms(-0.5)[1], (30, 1));
    }

    #[test]
    fn test_to_dms_carries_rounded_seconds() {
        assert_eq!(to_dms(12.99999999), [(13, 1), (0, 1), (0, 10_000)]);
        assert_eq!(to_dms(0.0), [(0, 1), (0, 1), (0, 10_000)]);
        let [_, (minutes, _), (seconds, _)] = to_dms(33.999_999_99);
        assert!(minutes < 60);
        assert!(seconds < 60 * 10_000);
    }

    #[test]
    fn test_capture_tags_keep_offset() {
        let taken_at = DateTime::parse_from_rfc3339("2024-06-01T08:15:30+02:00").unwrap();
        let tags = capture_tags(&taken_at, None);
        assert!(tags
            .iter()
            .any(|t| matches!(t, ExifTag::OffsetTimeOriginal(v) if v == "+02:00")));
        assert!(tags
            .iter()
            .any(|t| matches!(t, ExifTag::OffsetTime(v) if v == "+02:00")));
        assert!(tags
            .iter()
            .any(|t| matches!(t, ExifTag::ModifyDate(v) if v == "2024:06:01 08:15:30")));
        assert!(!tags.iter().any(|t| matches!(t, ExifTag::GPSLatitude(_))));
    }

    #[test]
    fn test_capture_tags_with_coordinates() {
        let taken_at = DateTime::parse_from_rfc3339("2024-06-01T08:15:30Z").unwrap();
        let coords = Coordinates {
            latitude: -33.8688,
            longitude: 151.2093,
        };
        let tags = capture_tags(&taken_at, Some(coords));
        assert!(tags
            .iter()
            .any(|t| matches!(t, ExifTag::GPSLatitudeRef(v) if v == "S")));
        assert!(tags
            .iter()
            .any(|t| matches!(t, ExifTag::GPSLongitudeRef(v) if v == "E")));
    }

    #[tokio::test]
    async fn test_offset_is_written_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024-06-01-A.jpg");
        // Bare SOI and EOI markers: a JPEG with no EXIF segment yet.
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        let taken_at = DateTime::parse_from_rfc3339("2024-06-01T08:15:30+02:00").unwrap();

        LittleExifTagger
            .tag_file(&path, taken_at, None)
            .await
            .unwrap();

        let metadata = Metadata::new_from_path(&path).unwrap();
        let offset = metadata
            .get_tag(&ExifTag::OffsetTimeOriginal(String::new()))
            .find_map(|t| match t {
                ExifTag::OffsetTimeOriginal(v) => Some(v.trim_end_matches('\0').to_string()),
                _ => None,
            });
        assert_eq!(offset.as_deref(), Some("+02:00"));
    }

    #[tokio::test]
    async fn test_non_image_file_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-an-image.txt");
        std::fs::write(&path, b"plain text").unwrap();
        let taken_at = DateTime::parse_from_rfc3339("2024-01-05T10:00:00Z").unwrap();
        let err = LittleExifTagger
            .tag_file(&path, taken_at, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TagError::Write { .. }));
    }
}
