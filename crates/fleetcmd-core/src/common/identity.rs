//! Per-worker identity (VIN) derivation.

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Smallest identity a worker can be assigned.
pub const IDENTITY_MIN: u32 = 10_000_000;

/// Largest identity a worker can be assigned.
pub const IDENTITY_MAX: u32 = 99_999_999;

/// Derives the identity of the worker at `worker_index`.
///
/// A generator seeded with the index draws one value uniformly from
/// [`IDENTITY_MIN`, `IDENTITY_MAX`], so restarting a pool with the same worker
/// count hands every slot the same VIN it had before. Identities of different
/// slots are not checked for collisions.
pub fn derive_identity(worker_index: usize) -> String {
    let mut rng = StdRng::seed_from_u64(worker_index as u64);
    rng.random_range(IDENTITY_MIN..=IDENTITY_MAX).to_string()
}
