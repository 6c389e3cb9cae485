use crate::error::{map_io_error, Result, StorageError};
use async_trait::async_trait;
use linkshrink_core::{BackendKind, Repository, ShortCode, UrlRecord, MAX_ID_ATTEMPTS};
use linkshrink_generator::{Generator, UuidGenerator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument, Span};

/// One element of the on-disk JSON array.
#[derive(Debug, Serialize, Deserialize)]
struct StoredUrl {
    uuid: String,
    original_url: String,
}

#[derive(Serialize)]
struct StoredUrlRef<'a> {
    uuid: &'a str,
    original_url: &'a str,
}

/// File-backed implementation of the Repository trait.
///
/// The whole record set lives in memory and is written through to a JSON file
/// after every successful save. The mutex is held across the file write, so
/// saves are fully serialized and the file always matches the map once a call
/// returns. Like [`InMemoryRepository`](crate::InMemoryRepository), repeated
/// URLs are stored as separate records.
#[derive(Debug)]
pub struct FileRepository<G = UuidGenerator> {
    path: PathBuf,
    temp_path: PathBuf,
    storage: Mutex<BTreeMap<String, String>>,
    generator: G,
    span: Span,
}

impl FileRepository {
    /// Opens (or creates) the storage file at `path` using the default id generator.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_generator(path, UuidGenerator::new()).await
    }
}

impl<G: Generator> FileRepository<G> {
    /// Opens the storage file at `path` and loads every record into memory.
    ///
    /// A missing file is created with an empty record set. Any other read or
    /// decode failure is returned as an error.
    pub async fn open_with_generator(path: impl Into<PathBuf>, generator: G) -> Result<Self> {
        let path = path.into();
        let span = tracing::info_span!("storage", backend = "file", path = %path.display());

        let storage = Self::load_from_file(&path).instrument(span.clone()).await?;

        Ok(Self {
            temp_path: temp_path_for(&path),
            path,
            storage: Mutex::new(storage),
            generator,
            span,
        })
    }

    /// Replaces the span every operation is logged under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.storage.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.lock().await.is_empty()
    }

    async fn load_from_file(path: &Path) -> Result<BTreeMap<String, String>> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Self::create_empty(path).await?;
                info!("created empty storage file");
                return Ok(BTreeMap::new());
            }
            Err(err) => return Err(map_io_error("failed to read storage file", err)),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        let records: Vec<StoredUrl> = serde_json::from_slice(&data).map_err(|e| {
            StorageError::InvalidData(format!("failed to decode storage file: {e}"))
        })?;

        let mut storage = BTreeMap::new();
        for record in records {
            if storage
                .insert(record.uuid.clone(), record.original_url)
                .is_some()
            {
                warn!(id = %record.uuid, "duplicate id in storage file, keeping the last entry");
            }
        }

        info!(records = storage.len(), "loaded storage file");
        Ok(storage)
    }

    async fn create_empty(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error("failed to create storage directory", e))?;
        }

        tokio::fs::write(path, b"[]")
            .await
            .map_err(|e| map_io_error("failed to create storage file", e))
    }

    /// Replaces the file contents with `storage`.
    async fn save_to_file(&self, storage: &BTreeMap<String, String>) -> Result<()> {
        let records: Vec<StoredUrlRef<'_>> = storage
            .iter()
            .map(|(uuid, original_url)| StoredUrlRef { uuid, original_url })
            .collect();

        let data = serde_json::to_vec(&records).map_err(|e| {
            StorageError::InvalidData(format!("failed to encode storage file: {e}"))
        })?;

        tokio::fs::write(&self.temp_path, &data)
            .await
            .map_err(|e| map_io_error("failed to write storage file", e))?;
        tokio::fs::rename(&self.temp_path, &self.path)
            .await
            .map_err(|e| map_io_error("failed to replace storage file", e))
    }

    async fn save_inner(&self, original_url: &str) -> Result<ShortCode> {
        let mut storage = self.storage.lock().await;

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id: ShortCode = self.generator.generate().into();
            if storage.contains_key(id.as_str()) {
                warn!(id = %id, attempt, "generated id already taken, retrying");
                continue;
            }

            storage.insert(id.as_str().to_owned(), original_url.to_owned());
            if let Err(err) = self.save_to_file(&storage).await {
                // keep memory in line with what is on disk
                storage.remove(id.as_str());
                warn!(id = %id, error = %err, "write-through failed, insert undone");
                return Err(err);
            }

            debug!(id = %id, url = %original_url, "saved url");
            return Ok(id);
        }

        Err(StorageError::AttemptsExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "storage".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl<G: Generator> Repository for FileRepository<G> {
    async fn save(&self, original_url: &str) -> Result<ShortCode> {
        self.save_inner(original_url)
            .instrument(self.span.clone())
            .await
    }

    async fn find(&self, id: &ShortCode) -> Result<UrlRecord> {
        let storage = self.storage.lock().await;
        match storage.get(id.as_str()) {
            Some(original_url) => Ok(UrlRecord {
                id: id.clone(),
                original_url: original_url.clone(),
            }),
            None => Err(StorageError::NotFound(id.to_string())),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }
}
