pub use linkshrink_core::error::{Result, StorageError};

/// Name of the unique constraint on the `uuid` column in `ddl/postgres/urls.sql`.
pub(crate) const UUID_CONSTRAINT: &str = "urls_uuid_key";

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Whether `err` is a unique violation on the generated-id constraint.
pub(crate) fn is_id_collision(err: &sqlx::Error) -> bool {
    is_unique_violation(err)
        && err
            .as_database_error()
            .and_then(|db| db.constraint())
            .is_some_and(|name| name == UUID_CONSTRAINT)
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

pub(crate) fn map_io_error(context: &str, err: std::io::Error) -> StorageError {
    StorageError::Io(format!("{context}: {err}"))
}
