//! Storage backends for linkshrink.
//!
//! Three interchangeable implementations of [`Repository`]:
//!
//! - [`InMemoryRepository`]: process-lifetime map.
//! - [`FileRepository`]: map written through to a JSON file.
//! - [`PostgresRepository`]: table with a unique index on the original URL,
//!   the only backend offering transactions and a liveness check.
//!
//! [`Backend`] selects one of them from a [`StorageConfig`] at startup.

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
pub mod postgres;

pub use backend::{Backend, StorageConfig};
pub use error::{Result, StorageError};
pub use file::FileRepository;
pub use linkshrink_core::{Capabilities, Repository, Transaction, Transactional};
pub use memory::InMemoryRepository;
pub use postgres::{PostgresRepository, PostgresTransaction};
