use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tokio::process::Command;

use super::{exif_datetime, exif_offset, Coordinates, TagError, Tagger};

/// Runs `exiftool -overwrite_original ...` against each file.
#[derive(Debug, Clone)]
pub struct ExifToolTagger {
    program: PathBuf,
}

impl ExifToolTagger {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }
}

/// Argument vector for one exiftool invocation. The target path comes last.
pub fn exiftool_args(
    path: &Path,
    taken_at: &DateTime<FixedOffset>,
    coords: Option<Coordinates>,
) -> Vec<String> {
    let datetime = exif_datetime(taken_at);
    let offset = exif_offset(taken_at);
    let mut args = vec![
        "-overwrite_original".to_string(),
        format!("-DateTimeOriginal={}", datetime),
        format!("-CreateDate={}", datetime),
        format!("-ModifyDate={}", datetime),
        format!("-OffsetTimeOriginal={}", offset),
        format!("-OffsetTime={}", offset),
    ];
    if let Some(c) = coords {
        args.push(format!("-GPSLatitude={:.6}", c.latitude.abs()));
        args.push(format!("-GPSLatitudeRef={}", c.latitude_ref()));
        args.push(format!("-GPSLongitude={:.6}", c.longitude.abs()));
        args.push(format!("-GPSLongitudeRef={}", c.longitude_ref()));
    }
    args.push(path.display().to_string());
    args
}

#[async_trait]
impl Tagger for ExifToolTagger {
    async fn tag_file(
        &self,
        path: &Path,
        taken_at: DateTime<FixedOffset>,
        coords: Option<Coordinates>,
    ) -> Result<(), TagError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(exiftool_args(path, &taken_at, coords))
            .output()
            .await
            .map_err(|source| TagError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(TagError::Failed {
                program,
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        tracing::debug!(path = %path.display(), "exiftool tagged file");
        Ok(())
    }
}
