use crate::Generator;
use ::uuid::Uuid;
use linkshrink_core::ShortCode;

/// Generates ids from random (v4) UUIDs.
///
/// Codes are the 32-character lowercase hex form without hyphens. With 122
/// random bits a collision is not expected in practice, but backends still
/// treat one as retryable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl UuidGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for UuidGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        let id = Uuid::new_v4();
        ShortCode::new_unchecked(id.simple().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn produces_valid_hex_codes() {
        let generator = UuidGenerator::new();
        let code = generator.generate();

        assert_eq!(code.as_str().len(), 32);
        assert!(code.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(ShortCode::new(code.as_str()).is_ok());
    }

    #[test]
    fn consecutive_codes_differ() {
        let generator = UuidGenerator::new();
        assert_ne!(generator.generate(), generator.generate());
    }

    #[test]
    fn concurrent_generation_is_unique() {
        let generator = Arc::new(UuidGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| generator.generate())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for code in handle.join().unwrap() {
                assert!(seen.insert(code));
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
