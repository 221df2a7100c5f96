use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::ItemError;

/// `<name>.part` next to the final destination.
fn part_path(download_path: &Path) -> PathBuf {
    let mut name = download_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    download_path.with_file_name(name)
}

/// Stream `url` into `download_path` through a `.part` file.
///
/// The final path only appears once the body has been fully written, so an
/// interrupted transfer never leaves a truncated image under the real name.
/// Returns the number of bytes written.
pub async fn download_file(
    client: &Client,
    url: &str,
    download_path: &Path,
) -> Result<u64, ItemError> {
    let http_err = |source, bytes_written| ItemError::Http {
        url: url.to_string(),
        bytes_written,
        source,
    };

    let response = client.get(url).send().await.map_err(|e| http_err(e, 0))?;
    if !response.status().is_success() {
        return Err(ItemError::HttpStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let part_path = part_path(download_path);
    let result = match write_part(response, &part_path, url).await {
        Ok(bytes_written) => fs::rename(&part_path, download_path)
            .await
            .map(|()| bytes_written)
            .map_err(ItemError::from),
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = fs::remove_file(&part_path).await;
    }
    result
}

/// Stream the response body into `part_path`. The file is closed on return.
async fn write_part(
    response: reqwest::Response,
    part_path: &Path,
    url: &str,
) -> Result<u64, ItemError> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part_path)
        .await?;

    let mut bytes_written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| ItemError::Http {
            url: url.to_string(),
            bytes_written,
            source,
        })?;
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(bytes_written)
}

/// Set the modification and access times of a file to the given Unix
/// timestamp. Dates before 1970 are clamped to the epoch.
pub fn set_file_mtime(path: &Path, timestamp: i64) -> std::io::Result<()> {
    let time = if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        UNIX_EPOCH
    };
    let times = FileTimes::new().set_modified(time).set_accessed(time);
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(times)?;
    Ok(())
}
