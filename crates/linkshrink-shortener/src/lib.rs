//! URL shortener service implementation.
//!
//! This crate provides [`ShortenerService`], the orchestrator that turns
//! repository writes into canonical short codes, together with the conflict
//! classification and batch coordination it relies on. Core types are
//! re-exported from `linkshrink_core`.

pub mod batch;
pub mod conflict;
pub mod service;

#[cfg(test)]
mod testing;

pub use batch::BatchCoordinator;
pub use conflict::{classify, ErrorClass};
pub use linkshrink_core::ShortenerError;
pub use service::{validate_url, ShortenerService, DEFAULT_MAX_ATTEMPTS};
