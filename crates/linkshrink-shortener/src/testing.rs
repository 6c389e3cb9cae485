//! Repository doubles for service and batch tests.

use async_trait::async_trait;
use linkshrink_core::{
    BackendKind, Capabilities, Pingable, Repository, ShortCode, StorageError, Transaction,
    Transactional, UrlRecord,
};
use linkshrink_storage::InMemoryRepository;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Result<T> = std::result::Result<T, StorageError>;

/// Fails saves in script order, then delegates to an in-memory repository.
/// A `None` step lets that call through.
pub(crate) struct ScriptedRepository {
    script: Mutex<VecDeque<Option<StorageError>>>,
    calls: AtomicU32,
    pub(crate) inner: InMemoryRepository,
}

impl ScriptedRepository {
    pub(crate) fn new(script: Vec<Option<StorageError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            inner: InMemoryRepository::new(),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for ScriptedRepository {
    async fn save(&self, original_url: &str) -> Result<ShortCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front().flatten();
        match step {
            Some(err) => Err(err),
            None => self.inner.save(original_url).await,
        }
    }

    async fn find(&self, id: &ShortCode) -> Result<UrlRecord> {
        self.inner.find(id).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ephemeral
    }
}

#[derive(Default)]
struct LedgerState {
    committed: Mutex<HashMap<String, String>>,
    next_id: AtomicU64,
    rollbacks: AtomicU32,
    commits: AtomicU32,
    poisoned_url: Mutex<Option<String>>,
    collisions: AtomicU32,
}

impl LedgerState {
    fn next_code(&self) -> ShortCode {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        ShortCode::new_unchecked(format!("id{n}"))
    }

    fn check_poisoned(&self, original_url: &str) -> Result<()> {
        match self.poisoned_url.lock().unwrap().as_deref() {
            Some(url) if url == original_url => {
                Err(StorageError::Query(format!("refused to store {original_url}")))
            }
            _ => Ok(()),
        }
    }

    /// Consumes one queued id collision, if any.
    fn take_collision(&self) -> bool {
        self.collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn committed_id_for(&self, original_url: &str) -> Option<ShortCode> {
        self.committed
            .lock()
            .unwrap()
            .iter()
            .find(|(_, url)| url.as_str() == original_url)
            .map(|(id, _)| ShortCode::new_unchecked(id.clone()))
    }
}

/// Relational-style double: unique URLs, transactions that buffer writes
/// until commit, a URL that always fails with a fatal error, and queued id
/// collisions for transactional saves.
#[derive(Clone, Default)]
pub(crate) struct LedgerRepository {
    state: Arc<LedgerState>,
}

impl LedgerRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn poison(&self, original_url: &str) {
        *self.state.poisoned_url.lock().unwrap() = Some(original_url.to_string());
    }

    /// Makes the next `n` transactional saves fail with an id collision.
    pub(crate) fn collide(&self, n: u32) {
        self.state.collisions.store(n, Ordering::SeqCst);
    }

    pub(crate) fn committed_len(&self) -> usize {
        self.state.committed.lock().unwrap().len()
    }

    pub(crate) fn commits(&self) -> u32 {
        self.state.commits.load(Ordering::SeqCst)
    }

    pub(crate) fn rollbacks(&self) -> u32 {
        self.state.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for LedgerRepository {
    async fn save(&self, original_url: &str) -> Result<ShortCode> {
        self.state.check_poisoned(original_url)?;
        if let Some(existing) = self.state.committed_id_for(original_url) {
            return Err(StorageError::Conflict { existing });
        }
        let id = self.state.next_code();
        self.state
            .committed
            .lock()
            .unwrap()
            .insert(id.to_string(), original_url.to_string());
        Ok(id)
    }

    async fn find(&self, id: &ShortCode) -> Result<UrlRecord> {
        let committed = self.state.committed.lock().unwrap();
        match committed.get(id.as_str()) {
            Some(url) => Ok(UrlRecord {
                id: id.clone(),
                original_url: url.clone(),
            }),
            None => Err(StorageError::NotFound(id.to_string())),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactions: Some(Arc::new(self.clone())),
            ping: Some(Arc::new(self.clone())),
        }
    }
}

#[async_trait]
impl Transactional for LedgerRepository {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(LedgerTransaction {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
        }))
    }
}

#[async_trait]
impl Pingable for LedgerRepository {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct LedgerTransaction {
    state: Arc<LedgerState>,
    pending: Vec<(String, String)>,
}

#[async_trait]
impl Transaction for LedgerTransaction {
    async fn save(&mut self, original_url: &str) -> Result<ShortCode> {
        self.state.check_poisoned(original_url)?;
        if self.state.take_collision() {
            return Err(StorageError::IdCollision(self.state.next_code().to_string()));
        }
        if let Some(existing) = self.state.committed_id_for(original_url) {
            return Err(StorageError::Conflict { existing });
        }
        if let Some((id, _)) = self.pending.iter().find(|(_, url)| url == original_url) {
            return Err(StorageError::Conflict {
                existing: ShortCode::new_unchecked(id.clone()),
            });
        }
        let id = self.state.next_code();
        self.pending.push((id.to_string(), original_url.to_string()));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.state.committed.lock().unwrap().extend(this.pending);
        this.state.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
