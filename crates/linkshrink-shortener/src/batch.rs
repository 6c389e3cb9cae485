use crate::conflict::{classify, ErrorClass};
use crate::service::ShortenerService;
use linkshrink_core::{
    BatchEntry, BatchItem, Repository, ShortCode, Shortener, ShortenerError, Transaction,
    Transactional,
};
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, ShortenerError>;

/// Runs a batch of shorten requests for a [`ShortenerService`].
///
/// When the backend offers transactions the whole batch is one unit: it
/// either commits completely or leaves nothing behind. Otherwise entries are
/// shortened one after another and a failure keeps what was already stored.
pub struct BatchCoordinator<'a, R> {
    service: &'a ShortenerService<R>,
}

impl<'a, R: Repository> BatchCoordinator<'a, R> {
    pub fn new(service: &'a ShortenerService<R>) -> Self {
        Self { service }
    }

    /// Shortens every entry. The result keeps the input order.
    pub async fn run(&self, entries: Vec<BatchEntry>) -> Result<Vec<BatchItem>> {
        if entries.is_empty() {
            return Err(ShortenerError::InvalidInput("batch is empty".to_string()));
        }

        let urls = validate_all(&entries)?;

        let items = match &self.service.capabilities().transactions {
            Some(transactions) => {
                self.run_in_transaction(transactions.as_ref(), &entries, &urls)
                    .await?
            }
            None => self.run_sequential(&entries, &urls).await?,
        };

        info!(size = items.len(), "batch shortened");
        Ok(items)
    }

    async fn run_in_transaction(
        &self,
        transactions: &dyn Transactional,
        entries: &[BatchEntry],
        urls: &[&str],
    ) -> Result<Vec<BatchItem>> {
        let mut tx = transactions.begin().await?;
        let mut items = Vec::with_capacity(entries.len());

        for (entry, url) in entries.iter().zip(urls) {
            match self.save_in(tx.as_mut(), url).await {
                Ok(code) => items.push(BatchItem {
                    correlation_id: entry.correlation_id.clone(),
                    code,
                }),
                Err(err) => {
                    warn!(
                        correlation_id = %entry.correlation_id,
                        error = %err,
                        "batch entry failed, rolling back"
                    );
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "rollback failed");
                    }
                    return Err(err);
                }
            }
        }

        tx.commit().await?;
        Ok(items)
    }

    async fn run_sequential(
        &self,
        entries: &[BatchEntry],
        urls: &[&str],
    ) -> Result<Vec<BatchItem>> {
        let mut items = Vec::with_capacity(entries.len());

        for (entry, url) in entries.iter().zip(urls) {
            let outcome = self.service.shorten(url).await.inspect_err(|err| {
                warn!(
                    correlation_id = %entry.correlation_id,
                    stored = items.len(),
                    error = %err,
                    "batch entry failed, earlier entries stay stored"
                );
            })?;
            items.push(BatchItem {
                correlation_id: entry.correlation_id.clone(),
                code: outcome.into_code(),
            });
        }

        Ok(items)
    }

    /// Saves one URL inside a transaction. A duplicate URL resolves to its
    /// existing id and an id collision is retried with a fresh id, up to the
    /// service's attempt limit. Anything else aborts the batch.
    async fn save_in(&self, tx: &mut dyn Transaction, url: &str) -> Result<ShortCode> {
        let max_attempts = self.service.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match tx.save(url).await {
                Ok(code) => return Ok(code),
                Err(err) => err,
            };

            match classify(&err) {
                ErrorClass::Unique(existing) => {
                    debug!(id = %existing, url = %url, "url already shortened");
                    return Ok(existing);
                }
                ErrorClass::Transient if attempt < max_attempts => {
                    warn!(attempt, error = %err, "transient error inside batch, retrying");
                }
                ErrorClass::Transient => {
                    return Err(ShortenerError::AttemptsExhausted {
                        attempts: attempt,
                        original_url: url.to_string(),
                    });
                }
                ErrorClass::Fatal => return Err(err.into()),
            }
        }
    }
}

/// Validates every entry before anything is written.
fn validate_all(entries: &[BatchEntry]) -> Result<Vec<&str>> {
    entries
        .iter()
        .map(|entry| {
            validate_url(&entry.original_url).map_err(|reason| {
                ShortenerError::InvalidInput(format!(
                    "entry {}: {reason}",
                    entry.correlation_id
                ))
            })
        })
        .collect()
}

fn validate_url(url: &str) -> std::result::Result<&str, String> {
    crate::service::validate_url(url).map_err(|err| match err {
        ShortenerError::InvalidInput(reason) => reason,
        other => other.to_string(),
    })
}
