use crate::error::{Result, StorageError};
use async_trait::async_trait;
use linkshrink_core::{BackendKind, Repository, ShortCode, UrlRecord, MAX_ID_ATTEMPTS};
use linkshrink_generator::{Generator, UuidGenerator};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn, Span};

/// Process-lifetime implementation of the Repository trait.
///
/// A single mutex guards the whole map; it is held only for the map access.
/// Repeated URLs are not deduplicated: every save stores a new record.
#[derive(Debug)]
pub struct InMemoryRepository<G = UuidGenerator> {
    storage: Mutex<HashMap<String, String>>,
    generator: G,
    span: Span,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository with the default id generator.
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator::new())
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Generator> InMemoryRepository<G> {
    pub fn with_generator(generator: G) -> Self {
        Self {
            storage: Mutex::new(HashMap::new()),
            generator,
            span: tracing::info_span!("storage", backend = "memory"),
        }
    }

    /// Replaces the span every operation is logged under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Inserts `original_url` under `id` unless the id is taken.
    fn try_insert(&self, id: &ShortCode, original_url: &str) -> Result<()> {
        let mut storage = self.storage.lock();
        if storage.contains_key(id.as_str()) {
            return Err(StorageError::IdCollision(id.to_string()));
        }
        storage.insert(id.as_str().to_owned(), original_url.to_owned());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.lock().is_empty()
    }
}

#[async_trait]
impl<G: Generator> Repository for InMemoryRepository<G> {
    async fn save(&self, original_url: &str) -> Result<ShortCode> {
        self.span.in_scope(|| {
            for attempt in 1..=MAX_ID_ATTEMPTS {
                let id: ShortCode = self.generator.generate().into();
                match self.try_insert(&id, original_url) {
                    Ok(()) => {
                        debug!(id = %id, url = %original_url, "saved url");
                        return Ok(id);
                    }
                    Err(StorageError::IdCollision(_)) => {
                        warn!(id = %id, attempt, "generated id already taken, retrying");
                    }
                    Err(other) => return Err(other),
                }
            }

            Err(StorageError::AttemptsExhausted {
                attempts: MAX_ID_ATTEMPTS,
            })
        })
    }

    async fn find(&self, id: &ShortCode) -> Result<UrlRecord> {
        let storage = self.storage.lock();
        match storage.get(id.as_str()) {
            Some(original_url) => Ok(UrlRecord {
                id: id.clone(),
                original_url: original_url.clone(),
            }),
            None => Err(StorageError::NotFound(id.to_string())),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ephemeral
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays a fixed list of ids, repeating the last one forever.
    pub(crate) struct ScriptedGenerator {
        ids: Vec<&'static str>,
        next: AtomicUsize,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(ids: Vec<&'static str>) -> Self {
            Self {
                ids,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl Generator for ScriptedGenerator {
        type Output = ShortCode;

        fn generate(&self) -> ShortCode {
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let id = self.ids[index.min(self.ids.len() - 1)];
            ShortCode::new_unchecked(id)
        }
    }

    #[tokio::test]
    async fn save_and_find() {
        let repo = InMemoryRepository::new();

        let id = repo.save("http://example.com").await.unwrap();
        assert!(!id.as_str().is_empty());

        let record = repo.find(&id).await.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.original_url, "http://example.com");
    }

    #[tokio::test]
    async fn find_nonexistent() {
        let repo = InMemoryRepository::new();

        let err = repo
            .find(&ShortCode::new_unchecked("nonexistent"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn repeated_url_creates_new_record() {
        let repo = InMemoryRepository::new();

        let first = repo.save("http://example.com").await.unwrap();
        let second = repo.save("http://example.com").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn retries_on_id_collision() {
        let repo = InMemoryRepository::with_generator(ScriptedGenerator::new(vec![
            "aaa", "aaa", "aaa", "bbb",
        ]));

        let first = repo.save("http://one.example").await.unwrap();
        let second = repo.save("http://two.example").await.unwrap();

        assert_eq!(first.as_str(), "aaa");
        assert_eq!(second.as_str(), "bbb");
        assert_eq!(
            repo.find(&first).await.unwrap().original_url,
            "http://one.example"
        );
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let repo = InMemoryRepository::with_generator(ScriptedGenerator::new(vec!["aaa"]));

        repo.save("http://one.example").await.unwrap();
        let err = repo.save("http://two.example").await.unwrap_err();

        assert!(matches!(
            err,
            StorageError::AttemptsExhausted {
                attempts: MAX_ID_ATTEMPTS
            }
        ));
        // the original mapping is untouched
        assert_eq!(
            repo.find(&ShortCode::new_unchecked("aaa"))
                .await
                .unwrap()
                .original_url,
            "http://one.example"
        );
    }

    #[tokio::test]
    async fn has_no_optional_capabilities() {
        let repo = InMemoryRepository::new();
        let capabilities = repo.capabilities();

        assert!(!capabilities.is_transactional());
        assert!(!capabilities.is_pingable());
        assert_eq!(repo.kind(), BackendKind::Ephemeral);
    }

    #[tokio::test]
    async fn concurrent_saves_yield_distinct_ids() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..100u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let url = format!("http://url{}.com", i);
                let id = repo.save(&url).await.unwrap();
                (id, url)
            }));
        }

        let mut saved = vec![];
        for handle in handles {
            saved.push(handle.await.unwrap());
        }

        let distinct: std::collections::HashSet<_> = saved.iter().map(|(id, _)| id).collect();
        assert_eq!(distinct.len(), 100);

        for (id, url) in saved {
            assert_eq!(repo.find(&id).await.unwrap().original_url, url);
        }
    }
}
