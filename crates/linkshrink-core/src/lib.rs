//! Core types and traits for the linkshrink URL shortener.
//!
//! This crate provides the storage contract shared by every backend and the
//! service-level [`Shortener`] trait consumed by the HTTP gateway.

pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{CoreError, ShortenerError, StorageError};
pub use repository::{
    BackendKind, Capabilities, Pingable, Repository, Transaction, Transactional, UrlRecord,
    MAX_ID_ATTEMPTS,
};
pub use shortcode::ShortCode;
pub use shortener::{BatchEntry, BatchItem, ShortenOutcome, Shortener};
