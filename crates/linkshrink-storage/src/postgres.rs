use crate::error::{is_id_collision, map_sqlx_error, Result, StorageError};
use async_trait::async_trait;
use linkshrink_core::{
    BackendKind, Capabilities, Pingable, Repository, ShortCode, Transaction, Transactional,
    UrlRecord,
};
use linkshrink_generator::{Generator, UuidGenerator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, PgConnection, Postgres, Row};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument, Span};

const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// PostgreSQL implementation of the repository contract.
///
/// Uniqueness of `original_url` is enforced by the `idx_original_url` index.
/// Inserts use `ON CONFLICT DO NOTHING`, so a duplicate URL never aborts the
/// surrounding transaction and is reported as
/// [`StorageError::Conflict`] carrying the id already on record.
pub struct PostgresRepository<G = UuidGenerator> {
    pool: PgPool,
    generator: Arc<G>,
    span: Span,
}

impl<G> Clone for PostgresRepository<G> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            generator: Arc::clone(&self.generator),
            span: self.span.clone(),
        }
    }
}

impl<G> std::fmt::Debug for PostgresRepository<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRepository")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl PostgresRepository {
    /// Creates a repository from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self::with_generator(pool, UuidGenerator::new())
    }

    /// Creates a repository by opening a new connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }
}

impl<G: Generator> PostgresRepository<G> {
    pub fn with_generator(pool: PgPool, generator: G) -> Self {
        Self {
            pool,
            generator: Arc::new(generator),
            span: tracing::info_span!("storage", backend = "postgres"),
        }
    }

    /// Replaces the span every operation is logged under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `urls` table and its indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .instrument(self.span.clone())
            .await
            .map_err(map_sqlx_error)?;
        self.span.in_scope(|| info!("schema is up to date"));
        Ok(())
    }

    /// Number of rows storing `original_url`. At most one while the index exists.
    pub async fn count_by_url(&self, original_url: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM urls WHERE original_url = $1")
            .bind(original_url)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.try_get("total").map_err(map_sqlx_error)
    }
}

/// Inserts one URL on `conn`, resolving a duplicate URL to its existing id.
async fn save_on<G: Generator>(
    conn: &mut PgConnection,
    generator: &G,
    original_url: &str,
) -> Result<ShortCode> {
    let id: ShortCode = generator.generate().into();

    let inserted = sqlx::query(
        r#"
        INSERT INTO urls (uuid, original_url)
        VALUES ($1, $2)
        ON CONFLICT (original_url) DO NOTHING
        RETURNING uuid
        "#,
    )
    .bind(id.as_str())
    .bind(original_url)
    .fetch_optional(&mut *conn)
    .await;

    match inserted {
        Ok(Some(_)) => {
            debug!(id = %id, url = %original_url, "saved url");
            Ok(id)
        }
        Ok(None) => {
            let existing = find_id_by_url(conn, original_url).await?;
            debug!(id = %existing, url = %original_url, "url already stored");
            Err(StorageError::Conflict { existing })
        }
        Err(err) if is_id_collision(&err) => Err(StorageError::IdCollision(id.to_string())),
        Err(err) => Err(map_sqlx_error(err)),
    }
}

async fn find_id_by_url(conn: &mut PgConnection, original_url: &str) -> Result<ShortCode> {
    let row = sqlx::query("SELECT uuid FROM urls WHERE original_url = $1")
        .bind(original_url)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    match row {
        Some(row) => {
            let uuid: String = row.try_get("uuid").map_err(map_sqlx_error)?;
            Ok(ShortCode::new_unchecked(uuid))
        }
        // the conflicting writer rolled back between our insert and this read
        None => Err(StorageError::IdCollision(format!(
            "conflicting row for {original_url} disappeared"
        ))),
    }
}

#[async_trait]
impl<G: Generator> Repository for PostgresRepository<G> {
    async fn save(&self, original_url: &str) -> Result<ShortCode> {
        async {
            let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
            save_on(&mut *conn, self.generator.as_ref(), original_url).await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn find(&self, id: &ShortCode) -> Result<UrlRecord> {
        let row = sqlx::query("SELECT original_url FROM urls WHERE uuid = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(id.to_string()));
        };

        let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
        Ok(UrlRecord {
            id: id.clone(),
            original_url,
        })
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
impl<G: Generator> Pingable for PostgresRepository<G> {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        conn.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl<G: Generator> Transactional for PostgresRepository<G> {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Transaction(format!("begin: {e}")))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        self.span.in_scope(|| debug!("transaction started"));

        Ok(Box::new(PostgresTransaction {
            tx,
            generator: Arc::clone(&self.generator),
            span: self.span.clone(),
        }))
    }
}

/// A read-committed transaction opened by [`PostgresRepository::begin`].
///
/// Dropped without commit, sqlx rolls it back.
pub struct PostgresTransaction<G> {
    tx: sqlx::Transaction<'static, Postgres>,
    generator: Arc<G>,
    span: Span,
}

#[async_trait]
impl<G: Generator> Transaction for PostgresTransaction<G> {
    /// Each save runs under its own savepoint, so a failed insert only undoes
    /// itself and the transaction stays usable for a retry.
    async fn save(&mut self, original_url: &str) -> Result<ShortCode> {
        let generator = Arc::clone(&self.generator);
        let tx = &mut self.tx;
        async move {
            let mut savepoint = Connection::begin(&mut **tx)
                .await
                .map_err(|e| StorageError::Transaction(format!("savepoint: {e}")))?;

            let saved = save_on(&mut *savepoint, generator.as_ref(), original_url).await;
            match &saved {
                Ok(_) | Err(StorageError::Conflict { .. }) => savepoint
                    .commit()
                    .await
                    .map_err(|e| StorageError::Transaction(format!("release savepoint: {e}")))?,
                Err(err) => {
                    debug!(error = %err, "rolling back to savepoint");
                    savepoint.rollback().await.map_err(|e| {
                        StorageError::Transaction(format!("rollback to savepoint: {e}"))
                    })?
                }
            }
            saved
        }
        .instrument(self.span.clone())
        .await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let span = self.span.clone();
        self.tx
            .commit()
            .await
            .map_err(|e| StorageError::Transaction(format!("commit: {e}")))?;
        span.in_scope(|| debug!("transaction committed"));
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let span = self.span.clone();
        self.tx
            .rollback()
            .await
            .map_err(|e| StorageError::Transaction(format!("rollback: {e}")))?;
        span.in_scope(|| warn!("transaction rolled back"));
        Ok(())
    }
}
