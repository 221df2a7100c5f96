use clap::{Parser, Subcommand};

use crate::types::{LedgerBackend, LogLevel, TaggerKind};

#[derive(Parser, Debug)]
#[command(
    name = "famlypd-rs",
    version,
    about = "Download tagged Famly photos with capture time and location metadata"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Famly site root
    #[arg(
        long,
        env = "FAMLY_WEBSITE",
        default_value = "https://app.nfamilyclub.com/",
        global = true
    )]
    pub website: String,

    /// API access token.
    /// WARNING: passing via --access-token is visible in process listings.
    /// Prefer the FAMLY_ACCESS_TOKEN environment variable instead.
    #[arg(long, env = "FAMLY_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    /// Installation id sent alongside the access token
    #[arg(long, env = "FAMLY_INSTALLATION_ID", global = true)]
    pub installation_id: Option<String>,

    /// Child whose tagged photos are downloaded
    #[arg(long, env = "FAMLY_CHILD_ID", global = true)]
    pub child_id: Option<String>,

    /// Latitude written into every photo (requires --longitude)
    #[arg(long, env = "LATITUDE", allow_hyphen_values = true, global = true)]
    pub latitude: Option<f64>,

    /// Longitude written into every photo (requires --latitude)
    #[arg(long, env = "LONGITUDE", allow_hyphen_values = true, global = true)]
    pub longitude: Option<f64>,

    /// Local directory for downloads
    #[arg(short = 'd', long, env = "FAMLY_OUTPUT", default_value = "output", global = true)]
    pub directory: String,

    /// Directory for the download ledger
    #[arg(long, default_value = "~/.famlypd-rs", global = true)]
    pub state_directory: String,

    /// Ledger storage backend
    #[arg(long, value_enum, default_value = "json", global = true)]
    pub ledger_backend: LedgerBackend,

    /// How capture metadata is written into files
    #[arg(long, value_enum, default_value = "exiftool", global = true)]
    pub tagger: TaggerKind,

    /// exiftool executable (for --tagger exiftool)
    #[arg(long, default_value = "exiftool", global = true)]
    pub exiftool_path: String,

    /// Items requested per catalog page
    #[arg(long, default_value_t = 100, global = true)]
    pub page_size: u32,

    /// Give up after this many pages
    #[arg(long, default_value_t = 10_000, global = true)]
    pub max_pages: u32,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub timeout: u64,

    /// Report what would be downloaded without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Disable progress bar
    #[arg(long, global = true)]
    pub no_progress_bar: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Download new photos (default)
    Sync,

    /// Show what the ledger holds
    Status,

    /// Delete the ledger so the next sync downloads everything again
    ResetLedger {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Record files already in the output directory as downloaded
    ImportExisting,
}

impl Cli {
    /// The subcommand to run; plain `famlypd-rs` means `sync`.
    pub fn effective_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Sync)
    }
}
