use crate::shortcode::ShortCode;
use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors returned by storage backends.
///
/// Callers classify these by variant only. `Conflict` and `IdCollision` are the
/// two recoverable cases; every other variant is fatal for the operation that
/// produced it.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The original URL is already stored under `existing`.
    #[error("original url already stored under id {existing}")]
    Conflict { existing: ShortCode },
    /// A client-generated id was already taken.
    #[error("id collision: {0}")]
    IdCollision(String),
    #[error("url not found: {0}")]
    NotFound(String),
    #[error("could not allocate a free id after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
}

/// Errors surfaced by the shortener service.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("url not found: {0}")]
    NotFound(String),
    #[error("gave up after {attempts} attempts to store {original_url}")]
    AttemptsExhausted { attempts: u32, original_url: String },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidInput(message),
        }
    }
}
