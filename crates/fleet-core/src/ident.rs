//! Random instance identifiers.
//!
//! One generator is seeded at first use and shared by every task in the
//! process. Draws go through a mutex so concurrent scale-up tasks never
//! observe the same generator state.

use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::InstanceIdentity;

/// Lowercase alphanumerics, valid anywhere in a DNS label.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Segment lengths composed into a short id (`xxxxxxxxx-xxxxx`).
pub const DEFAULT_SEGMENTS: [usize; 2] = [9, 5];

static GLOBAL: LazyLock<Arc<IdGenerator>> = LazyLock::new(|| Arc::new(IdGenerator::from_entropy()));

/// Concurrency-safe random string source.
#[derive(Debug)]
pub struct IdGenerator {
    rng: Mutex<StdRng>,
}

impl IdGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The process-wide generator, seeded on first use.
    pub fn global() -> Arc<IdGenerator> {
        Arc::clone(&GLOBAL)
    }

    /// A random string of `length` characters drawn from [`ALPHABET`].
    pub fn generate(&self, length: usize) -> String {
        // A poisoned lock only means another draw panicked; the rng state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        (0..length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    /// One random segment per entry in `segments`, joined with `-`.
    pub fn short_id(&self, segments: &[usize]) -> String {
        segments
            .iter()
            .map(|&len| self.generate(len))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// A fresh identity for an instance of `base_name` on `node_name`.
    pub fn identity(&self, base_name: &str, segments: &[usize], node_name: &str) -> InstanceIdentity {
        InstanceIdentity::new(base_name, &self.short_id(segments), node_name)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Draw from the process-wide generator.
pub fn generate(length: usize) -> String {
    IdGenerator::global().generate(length)
}
