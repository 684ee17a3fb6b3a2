//! Deterministic RNG hierarchy.
//!
//! Seeds belong only to clustering and Monte Carlo consumers (§9.1) — there is
//! no global RNG state. A master seed expands into per-purpose sub-seeds via
//! BLAKE3, so derivation order never affects the result: deriving the
//! `"clustering"` seed before or after `"monte_carlo:7"` produces identical
//! sub-seeds either way.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derives a deterministic sub-seed for a purpose label, e.g. `"clustering"`
    /// or `"monte_carlo:3"` for the fourth Monte Carlo trial.
    pub fn sub_seed(&self, purpose: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(purpose.as_bytes());
        let hash = hasher.finalize();
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap())
    }

    pub fn rng_for(&self, purpose: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(purpose))
    }

    /// Convenience for the Monte Carlo trial loop: seeds `0..n_simulations`.
    pub fn monte_carlo_rng(&self, trial: usize) -> StdRng {
        self.rng_for(&format!("monte_carlo:{trial}"))
    }
}
