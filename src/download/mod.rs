//! Sync engine: walks the catalog page by page with an `olderThan` cursor,
//! skips ids already in the ledger, and downloads, tags and records the rest.
//!
//! Everything is strictly sequential: one page in flight, one item at a time.
//! A failed item is logged and left out of the ledger so the next run retries
//! it; only page-level failures end the run. The ledger is saved exactly once
//! on the way out of [`SyncEngine::run`], whatever the outcome.

pub mod error;
pub mod file;
pub mod paths;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogClient, MediaItem, Watermark};
use crate::ledger::Ledger;
use crate::tagger::{Coordinates, Tagger};

pub use error::{ItemError, SyncError};

/// Subset of application config consumed by the sync engine.
/// Decoupled from CLI parsing so the engine can be tested independently.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub(crate) child_id: String,
    pub(crate) directory: PathBuf,
    pub(crate) page_size: u32,
    pub(crate) max_pages: u32,
    pub(crate) coordinates: Option<Coordinates>,
    pub(crate) dry_run: bool,
    pub(crate) no_progress_bar: bool,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pages: u32,
    pub seen: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub download_failed: usize,
    pub tag_failed: usize,
    pub would_download: usize,
    /// Pagination stopped because the server didn't honor the cursor.
    pub stalled: bool,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.download_failed + self.tag_failed
    }
}

/// What happened to one item.
#[derive(Debug)]
enum ItemOutcome {
    AlreadyDownloaded,
    Downloaded(PathBuf),
    WouldDownload(PathBuf),
    Failed(ItemError),
}

pub struct SyncEngine<'a> {
    config: &'a SyncConfig,
    catalog: &'a dyn CatalogClient,
    download_client: Client,
    tagger: &'a dyn Tagger,
    ledger: &'a mut dyn Ledger,
    shutdown_token: CancellationToken,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        config: &'a SyncConfig,
        catalog: &'a dyn CatalogClient,
        download_client: Client,
        tagger: &'a dyn Tagger,
        ledger: &'a mut dyn Ledger,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            catalog,
            download_client,
            tagger,
            ledger,
            shutdown_token,
        }
    }

    /// Run one full sync and persist the ledger.
    ///
    /// The ledger is saved even when pagination fails or is interrupted, so
    /// progress made before the failure is kept. If both the run and the
    /// save fail, the run's error is returned and the save error logged.
    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        let outcome = self.paginate(&mut report).await;
        let saved = self.ledger.save();

        log_summary(&report, self.config, started.elapsed());

        match (outcome, saved) {
            (Ok(()), Ok(())) => Ok(report),
            (Ok(()), Err(e)) => Err(SyncError::Ledger(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(save_err)) => {
                tracing::error!("Failed to save ledger after aborted run: {}", save_err);
                Err(e)
            }
        }
    }

    async fn paginate(&mut self, report: &mut SyncReport) -> Result<(), SyncError> {
        let mut watermark = Watermark::new();
        let mut page: u32 = 1;

        loop {
            if self.shutdown_token.is_cancelled() {
                return Err(SyncError::Interrupted);
            }

            let cursor = watermark.cursor();
            let items = self
                .catalog
                .fetch_page(&self.config.child_id, cursor, self.config.page_size)
                .await
                .map_err(|source| SyncError::Catalog { page, source })?;

            if items.is_empty() {
                tracing::info!("No more images to download");
                return Ok(());
            }
            // The page past the ceiling is still fetched so that a catalog
            // ending exactly at the ceiling completes normally.
            if page > self.config.max_pages {
                return Err(SyncError::PageLimit {
                    max_pages: self.config.max_pages,
                });
            }

            report.pages += 1;
            tracing::info!(
                page,
                items = items.len(),
                older_than = %cursor.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                "Processing page"
            );

            let pb = create_progress_bar(self.config.no_progress_bar, items.len() as u64);
            for item in &items {
                if self.shutdown_token.is_cancelled() {
                    pb.finish_and_clear();
                    return Err(SyncError::Interrupted);
                }
                watermark.observe(item.created_at);
                report.seen += 1;
                pb.set_message(item.id.clone());

                let outcome = self.process_item(item).await;
                record_outcome(report, item, outcome, &pb);
                pb.inc(1);
            }
            pb.finish_and_clear();
            tracing::debug!(page, oldest = ?watermark.oldest(), "Page processed");

            // Every page should push the cursor strictly older. If it
            // didn't, the next request would return this same page forever.
            let next = watermark.cursor();
            if let (Some(prev), Some(next)) = (cursor, next) {
                if next >= prev {
                    tracing::warn!(
                        page,
                        cursor = %prev,
                        "Catalog returned no items older than the cursor; stopping pagination"
                    );
                    report.stalled = true;
                    return Ok(());
                }
            }

            page += 1;
        }
    }

    async fn process_item(&mut self, item: &MediaItem) -> ItemOutcome {
        if self.ledger.contains(&item.id) {
            return ItemOutcome::AlreadyDownloaded;
        }

        let path = paths::item_path(&self.config.directory, item);
        if self.config.dry_run {
            return ItemOutcome::WouldDownload(path);
        }

        if path.exists() {
            tracing::debug!(
                id = %item.id,
                path = %path.display(),
                "File exists but is not in the ledger, downloading again"
            );
        }

        match self.download_and_tag(item, &path).await {
            Ok(()) => {
                self.ledger.record(&item.id, Utc::now());
                ItemOutcome::Downloaded(path)
            }
            Err(e) => ItemOutcome::Failed(e),
        }
    }

    async fn download_and_tag(&self, item: &MediaItem, path: &Path) -> Result<(), ItemError> {
        let url = item.source.as_ref().ok_or(ItemError::NoSource)?.to_url();

        tokio::fs::create_dir_all(&self.config.directory).await?;

        let bytes = file::download_file(&self.download_client, &url, path).await?;
        tracing::debug!(id = %item.id, bytes, path = %path.display(), "Downloaded");

        let mtime_path = path.to_path_buf();
        let ts = item.created_at.timestamp();
        match tokio::task::spawn_blocking(move || file::set_file_mtime(&mtime_path, ts)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Could not set mtime on {}: {}", path.display(), e),
            Err(e) => tracing::warn!("mtime task panicked: {}", e),
        }

        self.tagger
            .tag_file(path, item.created_at, self.config.coordinates)
            .await?;
        Ok(())
    }
}

fn record_outcome(
    report: &mut SyncReport,
    item: &MediaItem,
    outcome: ItemOutcome,
    pb: &ProgressBar,
) {
    match outcome {
        ItemOutcome::AlreadyDownloaded => {
            report.skipped += 1;
            pb.suspend(|| tracing::info!(id = %item.id, "Already downloaded, skipping"));
        }
        ItemOutcome::Downloaded(path) => {
            report.downloaded += 1;
            pb.suspend(|| tracing::info!(id = %item.id, path = %path.display(), "Saved"));
        }
        ItemOutcome::WouldDownload(path) => {
            report.would_download += 1;
            pb.suspend(|| {
                tracing::info!("[DRY RUN] Would download {} to {}", item.id, path.display())
            });
        }
        ItemOutcome::Failed(e) if e.is_tag_failure() => {
            report.tag_failed += 1;
            pb.suspend(|| {
                tracing::error!(id = %item.id, error = %e, "Downloaded but not tagged, will retry")
            });
        }
        ItemOutcome::Failed(e) => {
            report.download_failed += 1;
            pb.suspend(|| tracing::error!(id = %item.id, "Download failed: {}", e));
        }
    }
}

/// Create a progress bar with a consistent template.
///
/// Returns `ProgressBar::hidden()` when the user passed `--no-progress-bar` or
/// stdout is not a TTY (e.g. cron jobs).
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn log_summary(report: &SyncReport, config: &SyncConfig, elapsed: Duration) {
    if config.dry_run {
        tracing::info!("── Dry Run Summary ──");
        tracing::info!(
            "  {} would be downloaded, {} already downloaded, {} pages",
            report.would_download,
            report.skipped,
            report.pages
        );
        tracing::info!("  destination: {}", config.directory.display());
        return;
    }
    tracing::info!("── Summary ──");
    tracing::info!(
        "  {} seen: {} downloaded, {} skipped, {} failed ({} untagged), {} pages",
        report.seen,
        report.downloaded,
        report.skipped,
        report.failed(),
        report.tag_failed,
        report.pages
    );
    if report.stalled {
        tracing::info!("  stopped early: the catalog did not move past the cursor");
    }
    tracing::info!("  elapsed: {}", format_duration(elapsed));
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
