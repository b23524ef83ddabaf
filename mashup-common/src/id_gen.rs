//! Opaque id generation
//!
//! Ids are handed out through the [`IdGenerator`] capability so callers can
//! inject deterministic ids in tests.

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of opaque, collision-resistant ids
pub trait IdGenerator: Send + Sync {
    fn generate_id(&self) -> String;
}

/// Production generator: SHA-256 over a wall-clock seed and a monotonic counter
///
/// The counter lives inside the generator, so two generators created in the
/// same nanosecond still diverge once either has handed out an id.
pub struct HashedCounterIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl HashedCounterIdGenerator {
    /// Hex characters kept from the digest
    pub const ID_LEN: usize = 32;

    pub fn new() -> Self {
        let seed = chrono::Utc::now()
            .timestamp_nanos_opt()
            .map(|n| n as u128)
            .unwrap_or_default();
        Self::with_seed(seed)
    }

    pub fn with_seed(seed: u128) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for HashedCounterIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for HashedCounterIdGenerator {
    fn generate_id(&self) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_be_bytes());
        hasher.update(count.to_be_bytes());
        let digest = hasher.finalize();

        let mut id: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        id.truncate(Self::ID_LEN);
        id
    }
}

/// Deterministic generator (`<prefix>-1`, `<prefix>-2`, ...)
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}
