//! Entropy source for identity generation.
//!
//! Production code draws from the OS; tests and simulations use a seeded
//! generator so identities are reproducible.

use std::cell::RefCell;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Length in bytes of generated identity ids.
pub const ID_BYTES: usize = 16;

/// Source of random bytes.
pub trait Entropy {
    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Fresh hex-encoded identity id.
    fn random_id(&self) -> String {
        let mut bytes = [0u8; ID_BYTES];
        self.random_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl Entropy for SystemEntropy {
    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(e) = getrandom::fill(buffer) {
            tracing::error!("getrandom failed, using fallback generator: {}", e);
            ChaCha8Rng::from_entropy().fill_bytes(buffer);
        }
    }
}

/// Deterministic entropy from a seed.
#[derive(Debug)]
pub struct SeededEntropy {
    rng: RefCell<ChaCha8Rng>,
}

impl SeededEntropy {
    /// Generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self { rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)) }
    }
}

impl Entropy for SeededEntropy {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.borrow_mut().fill_bytes(buffer);
    }
}
