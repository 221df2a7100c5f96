use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use reqwest::Url;

use crate::catalog::ApiAuth;
use crate::cli::{Cli, Command};
use crate::download::paths::sanitize_component;
use crate::download::SyncConfig;
use crate::tagger::Coordinates;
use crate::types::{LedgerBackend, TaggerKind};

/// Application configuration, built once from the CLI and never mutated.
pub struct Config {
    pub website: Url,
    pub access_token: Option<String>,
    pub installation_id: Option<String>,
    pub child_id: String,
    pub directory: PathBuf,
    pub state_directory: PathBuf,
    pub exiftool_path: PathBuf,

    pub timeout: Duration,
    pub page_size: u32,
    pub max_pages: u32,
    pub coordinates: Option<Coordinates>,

    pub ledger_backend: LedgerBackend,
    pub tagger: TaggerKind,

    pub dry_run: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("website", &self.website.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("child_id", &self.child_id)
            .field("directory", &self.directory)
            .field("state_directory", &self.state_directory)
            .field("ledger_backend", &self.ledger_backend)
            .field("tagger", &self.tagger)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Tokens copied out of browser dev tools often keep their quotes.
fn clean_token(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> anyhow::Result<Option<Coordinates>> {
    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(latitude), Some(longitude)) => {
            if !(-90.0..=90.0).contains(&latitude) {
                anyhow::bail!("--latitude must be between -90 and 90, got {}", latitude);
            }
            if !(-180.0..=180.0).contains(&longitude) {
                anyhow::bail!("--longitude must be between -180 and 180, got {}", longitude);
            }
            Ok(Some(Coordinates {
                latitude,
                longitude,
            }))
        }
        _ => anyhow::bail!("--latitude and --longitude must be given together"),
    }
}

impl Config {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let command = cli.effective_command();

        let child_id = non_empty(cli.child_id)
            .context("--child-id (or FAMLY_CHILD_ID) is required")?;

        let access_token = cli
            .access_token
            .as_deref()
            .map(clean_token)
            .filter(|t| !t.is_empty());
        if command == Command::Sync && access_token.is_none() {
            anyhow::bail!("--access-token (or FAMLY_ACCESS_TOKEN) is required for sync");
        }

        let website = Url::parse(&cli.website)
            .with_context(|| format!("Invalid --website URL '{}'", cli.website))?;

        if cli.page_size == 0 {
            anyhow::bail!("--page-size must be at least 1");
        }
        if cli.max_pages == 0 {
            anyhow::bail!("--max-pages must be at least 1");
        }

        let coordinates = validate_coordinates(cli.latitude, cli.longitude)?;

        Ok(Self {
            website,
            access_token,
            installation_id: non_empty(cli.installation_id),
            child_id,
            directory: expand_tilde(&cli.directory),
            state_directory: expand_tilde(&cli.state_directory),
            exiftool_path: expand_tilde(&cli.exiftool_path),
            timeout: Duration::from_secs(cli.timeout),
            page_size: cli.page_size,
            max_pages: cli.max_pages,
            coordinates,
            ledger_backend: cli.ledger_backend,
            tagger: cli.tagger,
            dry_run: cli.dry_run,
            no_progress_bar: cli.no_progress_bar,
        })
    }

    /// `<state-directory>/<child id>.json` (or `.db`).
    pub fn ledger_path(&self) -> PathBuf {
        self.state_directory.join(format!(
            "{}.{}",
            sanitize_component(&self.child_id),
            self.ledger_backend.extension()
        ))
    }

    pub fn api_auth(&self) -> anyhow::Result<ApiAuth> {
        let access_token = self
            .access_token
            .clone()
            .context("--access-token (or FAMLY_ACCESS_TOKEN) is required")?;
        Ok(ApiAuth {
            access_token,
            installation_id: self.installation_id.clone(),
        })
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            child_id: self.child_id.clone(),
            directory: self.directory.clone(),
            page_size: self.page_size,
            max_pages: self.max_pages,
            coordinates: self.coordinates,
            dry_run: self.dry_run,
            no_progress_bar: self.no_progress_bar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["famlypd-rs"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    fn valid(extra: &[&str]) -> anyhow::Result<Config> {
        let mut args = vec!["--access-token", "tok", "--child-id", "child-1"];
        args.extend_from_slice(extra);
        Config::from_cli(cli(&args))
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/Documents");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("Documents"));
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(
            expand_tilde("/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            expand_tilde("relative/path"),
            PathBuf::from("relative/path")
        );
    }

    #[test]
    fn test_clean_token_strips_quotes() {
        assert_eq!(clean_token("\"abc-123\""), "abc-123");
        assert_eq!(clean_token("  'abc' "), "abc");
        assert_eq!(clean_token("abc"), "abc");
    }

    #[test]
    fn test_valid_config() {
        let cfg = valid(&["--latitude", "55.6761", "--longitude", "12.5683"]).unwrap();
        assert_eq!(cfg.child_id, "child-1");
        assert_eq!(cfg.page_size, 100);
        assert_eq!(
            cfg.coordinates,
            Some(Coordinates {
                latitude: 55.6761,
                longitude: 12.5683
            })
        );
        assert_eq!(cfg.api_auth().unwrap().access_token, "tok");
    }

    #[test]
    fn test_sync_requires_token() {
        let err = Config::from_cli(cli(&["--child-id", "c", "--access-token", "\"\""]))
            .unwrap_err();
        assert!(err.to_string().contains("access-token"));
    }

    #[test]
    fn test_status_does_not_require_token() {
        let cfg = Config::from_cli(cli(&["status", "--child-id", "c", "--access-token", ""]))
            .unwrap();
        assert!(cfg.access_token.is_none());
        assert!(cfg.api_auth().is_err());
    }

    #[test]
    fn test_child_id_required() {
        assert!(Config::from_cli(cli(&["--access-token", "t", "--child-id", "  "])).is_err());
    }

    #[test]
    fn test_coordinates_must_come_in_pairs() {
        assert!(valid(&["--latitude", "10"]).is_err());
        assert!(valid(&["--longitude", "10"]).is_err());
    }

    #[test]
    fn test_coordinates_range() {
        assert!(valid(&["--latitude", "91", "--longitude", "0"]).is_err());
        assert!(valid(&["--latitude", "0", "--longitude", "-180.5"]).is_err());
        assert!(valid(&["--latitude", "-90", "--longitude", "180"]).is_ok());
    }

    #[test]
    fn test_page_size_must_be_positive() {
        assert!(valid(&["--page-size", "0"]).is_err());
    }

    #[test]
    fn test_invalid_website() {
        assert!(valid(&["--website", "not a url"]).is_err());
    }

    #[test]
    fn test_ledger_path() {
        let cfg = valid(&[
            "--state-directory",
            "/tmp/state",
            "--ledger-backend",
            "sqlite",
        ])
        .unwrap();
        assert_eq!(cfg.ledger_path(), PathBuf::from("/tmp/state/child-1.db"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = valid(&[]).unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("tok\""));
        assert!(dbg.contains("<redacted>"));
    }
}
