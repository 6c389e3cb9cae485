use crate::batch::BatchCoordinator;
use crate::conflict::{classify, ErrorClass};
use async_trait::async_trait;
use linkshrink_core::{
    BatchEntry, BatchItem, Capabilities, Repository, ShortCode, ShortenOutcome, Shortener,
    ShortenerError, StorageError, MAX_ID_ATTEMPTS,
};
use std::sync::Arc;
use tracing::{debug, error, warn, Instrument, Span};

type Result<T> = std::result::Result<T, ShortenerError>;

/// Number of save attempts a single shorten makes before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = MAX_ID_ATTEMPTS;

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and handles:
/// - URL validation
/// - Retrying transient write failures with a fresh id
/// - Turning a duplicate-URL conflict into the existing short code
/// - Batches, through [`BatchCoordinator`]
///
/// The backend's capabilities are read once, at construction.
#[derive(Debug)]
pub struct ShortenerService<R> {
    repository: Arc<R>,
    capabilities: Capabilities,
    max_attempts: u32,
    span: Span,
}

impl<R> Clone for ShortenerService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            capabilities: self.capabilities.clone(),
            max_attempts: self.max_attempts,
            span: self.span.clone(),
        }
    }
}

impl<R: Repository> ShortenerService<R> {
    pub fn new(repository: R) -> Self {
        Self::from_arc(Arc::new(repository))
    }

    /// Creates a service over a repository that is shared with other owners.
    pub fn from_arc(repository: Arc<R>) -> Self {
        let capabilities = repository.capabilities();
        let span = tracing::info_span!("shortener", backend = repository.kind().as_str());
        Self {
            repository,
            capabilities,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            span,
        }
    }

    /// Caps the attempts made by one shorten call. Values below one are raised to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// One shorten call against the repository, retrying transient failures.
    async fn save_with_retry(&self, original_url: &str) -> Result<ShortenOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.repository.save(original_url).await {
                Ok(code) => {
                    debug!(id = %code, url = %original_url, "shortened url");
                    return Ok(ShortenOutcome::Created(code));
                }
                Err(err) => err,
            };

            match classify(&err) {
                ErrorClass::Unique(existing) => {
                    debug!(id = %existing, url = %original_url, "url already shortened");
                    return Ok(ShortenOutcome::Existing(existing));
                }
                ErrorClass::Transient if attempt < self.max_attempts => {
                    warn!(attempt, error = %err, "transient storage error, retrying");
                }
                ErrorClass::Transient => {
                    error!(attempts = attempt, url = %original_url, "giving up on url");
                    return Err(ShortenerError::AttemptsExhausted {
                        attempts: attempt,
                        original_url: original_url.to_string(),
                    });
                }
                ErrorClass::Fatal => {
                    error!(error = %err, url = %original_url, "failed to shorten url");
                    return Err(err.into());
                }
            }
        }
    }
}

/// Validates that the URL is an absolute http(s) URL with a host.
///
/// Returns the URL with surrounding whitespace removed.
pub fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ShortenerError::InvalidInput("URL cannot be empty".to_string()));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ShortenerError::InvalidInput(format!(
            "URL must have a valid scheme and host: {url}"
        )));
    };

    let scheme = scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(ShortenerError::InvalidInput(format!(
            "URL scheme must be http or https: {scheme}"
        )));
    }

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = match host_port.strip_prefix('[') {
        // IPv6 literal
        Some(v6) => v6.split(']').next().unwrap_or_default(),
        None => host_port.split(':').next().unwrap_or_default(),
    };
    if host.is_empty() {
        return Err(ShortenerError::InvalidInput(format!("URL must have a host: {url}")));
    }

    if url.chars().any(char::is_whitespace) {
        return Err(ShortenerError::InvalidInput(format!(
            "URL must not contain whitespace: {url}"
        )));
    }

    if url.chars().any(char::is_control) {
        return Err(ShortenerError::InvalidInput(format!(
            "URL must not contain control characters: {}",
            url.escape_debug()
        )));
    }

    Ok(url)
}

#[async_trait]
impl<R: Repository> Shortener for ShortenerService<R> {
    async fn shorten(&self, original_url: &str) -> Result<ShortenOutcome> {
        let original_url = validate_url(original_url)?;
        self.save_with_retry(original_url)
            .instrument(self.span.clone())
            .await
    }

    async fn shorten_batch(&self, entries: Vec<BatchEntry>) -> Result<Vec<BatchItem>> {
        BatchCoordinator::new(self)
            .run(entries)
            .instrument(self.span.clone())
            .await
    }

    async fn resolve(&self, id: &str) -> Result<String> {
        // an id that could never have been issued is simply unknown
        let Ok(code) = ShortCode::new(id) else {
            return Err(ShortenerError::NotFound(id.to_string()));
        };

        match self.repository.find(&code).await {
            Ok(record) => Ok(record.original_url),
            Err(StorageError::NotFound(_)) => Err(ShortenerError::NotFound(id.to_string())),
            Err(err) => {
                self.span
                    .in_scope(|| error!(id = %code, error = %err, "failed to resolve id"));
                Err(err.into())
            }
        }
    }

    async fn ping(&self) -> Option<Result<()>> {
        let pingable = self.capabilities.ping.as_ref()?;
        Some(pingable.ping().await.map_err(ShortenerError::from))
    }

    fn backend(&self) -> &'static str {
        self.repository.kind().as_str()
    }
}
