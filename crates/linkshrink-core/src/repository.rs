use crate::error::Result;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Upper bound on fresh ids a backend draws for a single save before giving up.
pub const MAX_ID_ATTEMPTS: u32 = 10;

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The id the record was stored under.
    pub id: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
}

/// The storage strategy behind a [`Repository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Process-lifetime map, nothing is persisted.
    Ephemeral,
    /// In-memory map mirrored to a JSON file on every write.
    File,
    /// PostgreSQL table with a unique index on the original URL.
    Relational,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ephemeral => "memory",
            BackendKind::File => "file",
            BackendKind::Relational => "postgres",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Persists `original_url` under a newly allocated id and returns it.
    ///
    /// Backends that enforce URL uniqueness return
    /// `Err(StorageError::Conflict { existing })` instead of inserting a
    /// second record for the same URL.
    async fn save(&self, original_url: &str) -> Result<ShortCode>;

    /// Looks up the record stored under `id`.
    /// Returns `Err(StorageError::NotFound)` if the id is unknown.
    async fn find(&self, id: &ShortCode) -> Result<UrlRecord>;

    fn kind(&self) -> BackendKind;

    /// Optional capabilities of this backend.
    ///
    /// The returned descriptor is fixed for the lifetime of the backend, so
    /// callers may read it once and keep it.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

/// A backend able to group several saves into one atomic unit.
#[async_trait]
pub trait Transactional: Send + Sync + 'static {
    /// Opens a read-committed transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// An open unit of work. Dropping it without committing discards its writes.
#[async_trait]
pub trait Transaction: Send {
    /// Same contract as [`Repository::save`], scoped to this transaction.
    async fn save(&mut self, original_url: &str) -> Result<ShortCode>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// A backend that can report whether its underlying engine is reachable.
#[async_trait]
pub trait Pingable: Send + Sync + 'static {
    async fn ping(&self) -> Result<()>;
}

/// Capability descriptor returned by [`Repository::capabilities`].
#[derive(Clone, Default)]
pub struct Capabilities {
    pub transactions: Option<Arc<dyn Transactional>>,
    pub ping: Option<Arc<dyn Pingable>>,
}

impl Capabilities {
    pub fn is_transactional(&self) -> bool {
        self.transactions.is_some()
    }

    pub fn is_pingable(&self) -> bool {
        self.ping.is_some()
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("transactions", &self.is_transactional())
            .field("ping", &self.is_pingable())
            .finish()
    }
}
