use crate::Generator;
use lapse_core::shortcode::{ALPHABET, SHORT_CODE_LENGTH};
use lapse_core::ShortCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// A generator that draws every character uniformly from the base62 alphabet.
///
/// It owns its random source instead of reaching for a process-wide one.
/// [`RandomGenerator::new`] seeds a ChaCha-based [`StdRng`] from the operating
/// system, which makes the codes unpredictable. There are 62^6 (about
/// 5.7 * 10^10) possible codes.
#[derive(Debug)]
pub struct RandomGenerator {
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    /// Creates a generator seeded from the operating system's secure source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a reproducible generator. Only meant for tests and tooling.
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        // the rng state is valid even if another thread panicked mid-draw
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut indices = [0_usize; SHORT_CODE_LENGTH];
        for index in &mut indices {
            *index = rng.random_range(0..ALPHABET.len());
        }
        ShortCode::from_indices(indices)
    }
}
