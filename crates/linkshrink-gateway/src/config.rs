use clap::{Parser, ValueEnum};
use linkshrink_storage::StorageConfig;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::Memory => write!(f, "memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{backend} storage requires {setting} to be set")]
    MissingSetting {
        backend: StorageBackendArg,
        setting: &'static str,
    },
}

/// Command line and environment configuration of the HTTP server.
///
/// Flags take precedence over environment variables.
#[derive(Debug, Parser)]
#[command(name = "linkshrink", about = "URL shortener HTTP server")]
pub struct Cli {
    /// Address to listen on, as `host:port`.
    #[arg(
        short = 'a',
        long = "address",
        env = SERVER_ADDRESS_ENV,
        default_value = DEFAULT_SERVER_ADDRESS
    )]
    pub address: String,

    /// Public base URL prefixed to every short code.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// JSON file backing the file storage.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// PostgreSQL connection string.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Storage backend. Inferred from the other settings when omitted.
    #[arg(long, env = STORAGE_BACKEND_ENV, value_enum)]
    pub storage: Option<StorageBackendArg>,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Resolves the storage backend to open.
    ///
    /// Without an explicit `--storage`, a DSN selects postgres, then a file
    /// path selects file storage, and memory is used otherwise.
    pub fn storage_config(&self) -> Result<StorageConfig, ConfigError> {
        let dsn = non_blank(self.database_dsn.as_deref());
        let path = self
            .file_storage_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty());

        let backend = match self.storage {
            Some(backend) => backend,
            None if dsn.is_some() => StorageBackendArg::Postgres,
            None if path.is_some() => StorageBackendArg::File,
            None => StorageBackendArg::Memory,
        };

        match backend {
            StorageBackendArg::Memory => Ok(StorageConfig::Memory),
            StorageBackendArg::File => path
                .map(|path| StorageConfig::File { path: path.clone() })
                .ok_or(ConfigError::MissingSetting {
                    backend,
                    setting: FILE_STORAGE_PATH_ENV,
                }),
            StorageBackendArg::Postgres => dsn
                .map(|dsn| StorageConfig::Postgres {
                    dsn: dsn.to_string(),
                })
                .ok_or(ConfigError::MissingSetting {
                    backend,
                    setting: DATABASE_DSN_ENV,
                }),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
