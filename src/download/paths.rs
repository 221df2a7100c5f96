use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::catalog::MediaItem;

const ITEM_EXTENSION: &str = "jpg";
const DATE_PREFIX_LEN: usize = "YYYY-MM-DD-".len();

/// Clean a filename by removing characters that are invalid on common
/// filesystems: `/`, `\`, `:`, `*`, `?`, `"`, `<`, `>`, `|`.
pub fn clean_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect()
}

/// `<YYYY-MM-DD>-<id>.jpg`, dated in the item's own offset.
pub fn item_file_name(created_at: &DateTime<FixedOffset>, id: &str) -> String {
    format!(
        "{}-{}.{}",
        created_at.format("%Y-%m-%d"),
        clean_filename(id),
        ITEM_EXTENSION
    )
}

pub fn item_path(directory: &Path, item: &MediaItem) -> PathBuf {
    directory.join(item_file_name(&item.created_at, &item.id))
}

/// Inverse of [`item_file_name`]: recover the capture date and id from a file
/// name, or `None` if it doesn't follow the scheme.
pub fn parse_item_file_name(name: &str) -> Option<(NaiveDate, String)> {
    let stem = name
        .strip_suffix(ITEM_EXTENSION)?
        .strip_suffix('.')?;
    if stem.len() <= DATE_PREFIX_LEN || !stem.is_char_boundary(DATE_PREFIX_LEN) {
        return None;
    }
    let (prefix, id) = stem.split_at(DATE_PREFIX_LEN);
    let date = NaiveDate::parse_from_str(prefix.strip_suffix('-')?, "%Y-%m-%d").ok()?;
    Some((date, id.to_string()))
}

/// Make an identifier safe to use as a single path component.
pub fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}
