//! Random payloads for write load.
//!
//! Each worker owns its own [`PayloadGenerator`], seeded independently from
//! the thread RNG, so generation never contends across workers.

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Length of every generated payload, in bytes.
pub const PAYLOAD_LEN: usize = 10;

/// Lowest byte a payload may contain.
pub const PAYLOAD_MIN: u8 = b'a';

/// Exclusive upper bound on payload bytes (`a` through `y`).
pub const PAYLOAD_END: u8 = b'z';

#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    rng: SmallRng,
}

impl PayloadGenerator {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_rng(&mut rand::rng()),
        }
    }

    /// A generator with a reproducible sequence.
    #[cfg(test)]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn next_payload(&mut self) -> String {
        (0..PAYLOAD_LEN)
            .map(|_| char::from(self.rng.random_range(PAYLOAD_MIN..PAYLOAD_END)))
            .collect()
    }
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}
