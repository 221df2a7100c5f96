//! famlypd-rs: incremental downloader for photos a child is tagged in on Famly.
//!
//! Pages backwards through the tagged-images catalog with an `olderThan`
//! cursor, downloads every image not already in the local ledger, stamps it
//! with its capture time and a configured GPS position, and records it so the
//! next run skips it.

#![warn(clippy::all)]

mod catalog;
mod cli;
mod config;
mod download;
mod ledger;
mod shutdown;
mod tagger;
mod types;

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use ledger::Ledger;
use types::LedgerBackend;

/// Run the sync command.
async fn run_sync(config: Config) -> anyhow::Result<()> {
    let shutdown_token = shutdown::install_signal_handler()?;

    let client = catalog::build_http_client(config.timeout)?;
    let catalog =
        catalog::HttpCatalogClient::new(client.clone(), &config.website, config.api_auth()?)?;
    tracing::debug!(endpoint = %catalog.endpoint(), "Catalog client ready");
    let tagger = tagger::build(config.tagger, &config.exiftool_path);

    let ledger_path = config.ledger_path();
    let mut ledger = ledger::open(config.ledger_backend, &ledger_path)?;
    tracing::info!(
        child_id = %config.child_id,
        ledger = %ledger_path.display(),
        known = ledger.len(),
        "Starting famlypd-rs"
    );
    if config.dry_run {
        tracing::info!("[DRY RUN] No files or ledger entries will be written");
    }

    let sync_config = config.sync_config();
    let mut engine = download::SyncEngine::new(
        &sync_config,
        &catalog,
        client,
        tagger.as_ref(),
        ledger.as_mut(),
        shutdown_token,
    );
    let report = match engine.run().await {
        Ok(report) => report,
        Err(e) => {
            if let download::SyncError::Catalog { source, .. } = &e {
                if matches!(source.status(), Some(401 | 403)) {
                    tracing::error!(
                        "The access token was rejected; copy a fresh one from the Famly web app"
                    );
                }
            }
            return Err(e.into());
        }
    };

    if report.failed() > 0 {
        tracing::warn!(
            "{} item(s) failed and will be retried on the next run",
            report.failed()
        );
    }
    Ok(())
}

/// Run the status command.
fn run_status(config: &Config) -> anyhow::Result<()> {
    let ledger_path = config.ledger_path();
    if !ledger_path.exists() {
        println!("No ledger found at {}", ledger_path.display());
        println!("Run a sync first to create it.");
        return Ok(());
    }

    let ledger = ledger::open(config.ledger_backend, &ledger_path)?;
    let entries = ledger.entries();

    println!("Ledger: {}", ledger.location().display());
    println!("  Child:      {}", config.child_id);
    if ledger.is_empty() {
        println!("  Downloaded: none yet");
        return Ok(());
    }
    println!("  Downloaded: {}", entries.len());
    if let Some(first) = entries.iter().map(|(_, at)| at).min() {
        println!("  First recorded: {}", first.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(last) = entries.iter().map(|(_, at)| at).max() {
        println!("  Last recorded:  {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

/// Run the reset-ledger command.
fn run_reset_ledger(config: &Config, yes: bool) -> anyhow::Result<()> {
    let ledger_path = config.ledger_path();

    if !ledger_path.exists() {
        println!("No ledger found at {}", ledger_path.display());
        return Ok(());
    }

    if !yes {
        println!("This will delete the ledger at:");
        println!("  {}", ledger_path.display());
        println!("The next sync will download every photo again.");
        println!();
        print!("Are you sure? [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    remove_ledger(&ledger_path, config.ledger_backend)?;
    println!("Ledger deleted.");

    Ok(())
}

/// Delete the ledger file, plus the WAL and SHM sidecars for SQLite.
fn remove_ledger(path: &Path, backend: LedgerBackend) -> std::io::Result<()> {
    std::fs::remove_file(path)?;
    if backend == LedgerBackend::Sqlite {
        // Sidecars are absent after a clean close.
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ImportSummary {
    scanned: usize,
    matched: usize,
    already_known: usize,
}

/// Record every `<date>-<id>.jpg` in `directory` that the ledger doesn't know.
fn import_existing(
    directory: &Path,
    ledger: &mut dyn Ledger,
    now: DateTime<Utc>,
) -> std::io::Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        summary.scanned += 1;
        let name = entry.file_name();
        let Some((_, id)) = name.to_str().and_then(download::paths::parse_item_file_name) else {
            tracing::debug!(file = ?name, "Not a downloaded item, ignoring");
            continue;
        };
        if ledger.contains(&id) {
            summary.already_known += 1;
        } else {
            ledger.record(&id, now);
            summary.matched += 1;
        }
    }
    Ok(summary)
}

/// Run the import-existing command.
fn run_import_existing(config: &Config) -> anyhow::Result<()> {
    if !config.directory.is_dir() {
        anyhow::bail!(
            "Output directory {} does not exist",
            config.directory.display()
        );
    }

    let ledger_path = config.ledger_path();
    let mut ledger = ledger::open(config.ledger_backend, &ledger_path)?;

    println!("Scanning {}...", config.directory.display());
    let summary = import_existing(&config.directory, ledger.as_mut(), Utc::now())?;

    if config.dry_run {
        println!("[DRY RUN] Ledger not modified");
    } else {
        ledger.save()?;
    }

    println!();
    println!("Import complete:");
    println!("  Files scanned:      {}", summary.scanned);
    println!("  Newly recorded:     {}", summary.matched);
    println!("  Already in ledger:  {}", summary.already_known);
    println!("  Ledger:             {}", ledger_path.display());

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let command = cli.effective_command();
    let config = Config::from_cli(cli)?;
    tracing::debug!(?config, "Loaded configuration");

    match command {
        Command::Sync => run_sync(config).await,
        Command::Status => run_status(&config),
        Command::ResetLedger { yes } => run_reset_ledger(&config, yes),
        Command::ImportExisting => run_import_existing(&config),
    }
}
