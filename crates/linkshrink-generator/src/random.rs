use crate::Generator;
use linkshrink_core::ShortCode;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use typed_builder::TypedBuilder;

/// Configures a [`RandomGenerator`].
#[derive(Debug, Clone, Copy, Default, TypedBuilder)]
pub struct RandomGeneratorSettings {
    /// Fixed seed for reproducible sequences. Seeded from the OS when `None`.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

/// Generates ids as non-negative 63-bit random integers in decimal form.
///
/// All callers share one PRNG behind a mutex. With 63 bits the birthday bound
/// is reached far earlier than with [`UuidGenerator`](crate::UuidGenerator),
/// so this generator relies on the backend's collision retry.
#[derive(Debug)]
pub struct RandomGenerator {
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    pub fn new(settings: RandomGeneratorSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Draws the next raw value.
    pub fn next_value(&self) -> u64 {
        // drop the top bit to stay within i64::MAX
        self.rng.lock().random::<u64>() >> 1
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(RandomGeneratorSettings::default())
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        ShortCode::new_unchecked(self.next_value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> RandomGenerator {
        RandomGenerator::new(RandomGeneratorSettings::builder().seed(seed).build())
    }

    #[test]
    fn values_fit_in_63_bits() {
        let generator = RandomGenerator::default();
        for _ in 0..1000 {
            assert!(generator.next_value() <= i64::MAX as u64);
        }
    }

    #[test]
    fn codes_are_decimal() {
        let generator = RandomGenerator::default();
        let code = generator.generate();

        assert!(!code.as_str().is_empty());
        assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
        assert!(code.as_str().parse::<i64>().is_ok());
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = seeded(42);
        let b = seeded(42);

        for _ in 0..10 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn consecutive_codes_differ() {
        let generator = seeded(7);
        assert_ne!(generator.generate(), generator.generate());
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RandomGenerator>();
    }
}
