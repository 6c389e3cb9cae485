use crate::error::{Result, StorageError};
use crate::{FileRepository, InMemoryRepository, PostgresRepository};
use async_trait::async_trait;
use linkshrink_core::{BackendKind, Capabilities, Repository, ShortCode, UrlRecord};
use std::path::PathBuf;
use tracing::info;

/// Startup settings selecting and locating the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    File { path: PathBuf },
    Postgres { dsn: String },
}

impl StorageConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            StorageConfig::Memory => BackendKind::Ephemeral,
            StorageConfig::File { .. } => BackendKind::File,
            StorageConfig::Postgres { .. } => BackendKind::Relational,
        }
    }
}

/// The backend chosen at startup.
///
/// Each variant keeps its own capabilities; the enum only delegates.
#[derive(Debug)]
pub enum Backend {
    Ephemeral(InMemoryRepository),
    File(FileRepository),
    Relational(PostgresRepository),
}

impl Backend {
    /// Builds the backend described by `config`.
    ///
    /// The relational backend is migrated before it is returned.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let backend = match config {
            StorageConfig::Memory => Backend::Ephemeral(InMemoryRepository::new()),
            StorageConfig::File { path } => Backend::File(FileRepository::open(path).await?),
            StorageConfig::Postgres { dsn } => {
                if dsn.is_empty() {
                    return Err(StorageError::Unavailable(
                        "postgres dsn must not be empty".to_string(),
                    ));
                }
                let repository = PostgresRepository::connect(dsn).await?;
                repository.migrate().await?;
                Backend::Relational(repository)
            }
        };

        info!(backend = %backend.kind(), "storage backend ready");
        Ok(backend)
    }
}

#[async_trait]
impl Repository for Backend {
    async fn save(&self, original_url: &str) -> Result<ShortCode> {
        match self {
            Backend::Ephemeral(repo) => repo.save(original_url).await,
            Backend::File(repo) => repo.save(original_url).await,
            Backend::Relational(repo) => repo.save(original_url).await,
        }
    }

    async fn find(&self, id: &ShortCode) -> Result<UrlRecord> {
        match self {
            Backend::Ephemeral(repo) => repo.find(id).await,
            Backend::File(repo) => repo.find(id).await,
            Backend::Relational(repo) => repo.find(id).await,
        }
    }

    fn kind(&self) -> BackendKind {
        match self {
            Backend::Ephemeral(repo) => repo.kind(),
            Backend::File(repo) => repo.kind(),
            Backend::Relational(repo) => repo.kind(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self {
            Backend::Ephemeral(repo) => repo.capabilities(),
            Backend::File(repo) => repo.capabilities(),
            Backend::Relational(repo) => repo.capabilities(),
        }
    }
}
