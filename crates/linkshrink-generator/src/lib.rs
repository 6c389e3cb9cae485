pub mod random;
pub mod uuid;

pub use random::{RandomGenerator, RandomGeneratorSettings};
pub use uuid::UuidGenerator;

use linkshrink_core::ShortCode;
use std::sync::Arc;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Backends call them before every insert attempt and handle the rare
/// collision themselves.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;
    /// Generates a candidate id.
    ///
    /// Must be safe to call from many tasks at once and must never return an
    /// empty code.
    fn generate(&self) -> Self::Output;
}

impl<G: Generator> Generator for Arc<G> {
    type Output = G::Output;

    fn generate(&self) -> Self::Output {
        (**self).generate()
    }
}
