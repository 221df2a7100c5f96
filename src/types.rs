#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Storage backend for the download ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LedgerBackend {
    Json,
    Sqlite,
}

impl LedgerBackend {
    pub fn extension(&self) -> &'static str {
        match self {
            LedgerBackend::Json => "json",
            LedgerBackend::Sqlite => "db",
        }
    }
}

/// How capture metadata is written into downloaded files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TaggerKind {
    #[value(name = "exiftool")]
    ExifTool,
    #[value(name = "little-exif")]
    LittleExif,
}
