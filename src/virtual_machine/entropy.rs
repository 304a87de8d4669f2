//! Randomness source for RANDOM.

use rand_core::{OsRng, RngCore};

/// Uniform integer source.
pub trait Entropy {
    /// Returns a value uniformly distributed in `[0, bound)`. `bound` is at least 2.
    fn below(&mut self, bound: u64) -> u64;
}

/// Operating-system randomness with rejection sampling.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn below(&mut self, bound: u64) -> u64 {
        // Largest multiple of `bound` that fits, so every residue is equally likely.
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let v = OsRng.next_u64();
            if v < zone {
                return v % bound;
            }
        }
    }
}
