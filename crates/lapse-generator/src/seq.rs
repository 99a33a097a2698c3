use crate::Generator;
use lapse_core::shortcode::{ALPHABET, SHORT_CODE_LENGTH};
use lapse_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

const BASE: u64 = ALPHABET.len() as u64;

/// Number of distinct codes; the counter wraps around after this many.
pub const CODE_SPACE: u64 = BASE.pow(SHORT_CODE_LENGTH as u32);

/// A deterministic short code generator using a sequential counter.
///
/// The counter is encoded as a fixed-width base62 number, so codes come out
/// as "aaaaaa", "aaaaab", ... in alphabet order. Codes are predictable, so
/// this generator suits tests and tooling, not public-facing links.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
        }
    }
}

impl SeqGenerator {
    /// Creates a sequential generator starting at the first code.
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Creates a sequential generator starting from a specific counter value.
    ///
    /// Useful for resuming from a known state or handing disjoint ranges to
    /// separate tools.
    pub fn with_offset(offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
        }
    }

    /// Encodes a counter value as a short code.
    pub fn encode(value: u64) -> ShortCode {
        let mut rest = value % CODE_SPACE;
        let mut indices = [0_usize; SHORT_CODE_LENGTH];
        for index in indices.iter_mut().rev() {
            *index = (rest % BASE) as usize;
            rest /= BASE;
        }
        ShortCode::from_indices(indices)
    }
}

impl Default for SeqGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for SeqGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        Self::encode(count)
    }
}
