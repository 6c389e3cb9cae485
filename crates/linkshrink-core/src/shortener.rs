use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// The outcome of a successful shorten call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenOutcome {
    /// A new record was stored.
    Created(ShortCode),
    /// The URL was already stored; this is its existing id.
    Existing(ShortCode),
}

impl ShortenOutcome {
    pub fn code(&self) -> &ShortCode {
        match self {
            ShortenOutcome::Created(code) | ShortenOutcome::Existing(code) => code,
        }
    }

    pub fn into_code(self) -> ShortCode {
        match self {
            ShortenOutcome::Created(code) | ShortenOutcome::Existing(code) => code,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ShortenOutcome::Created(_))
    }
}

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Caller-chosen key, carried through unchanged.
    pub correlation_id: String,
    pub original_url: String,
}

/// One entry of a batch shorten result, in the same position as its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: String,
    pub code: ShortCode,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens a single URL.
    async fn shorten(&self, original_url: &str) -> Result<ShortenOutcome>;

    /// Shortens every entry, atomically when the backend supports transactions.
    async fn shorten_batch(&self, entries: Vec<BatchEntry>) -> Result<Vec<BatchItem>>;

    /// Resolves a short code to its original URL.
    async fn resolve(&self, id: &str) -> Result<String>;

    /// Checks backend liveness.
    /// Returns `None` if the backend has no liveness check.
    async fn ping(&self) -> Option<Result<()>>;

    /// Name of the active backend.
    fn backend(&self) -> &'static str;
}
