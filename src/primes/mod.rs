//! Number-theoretic building blocks shared by the codec and the interpreter.
//!
//! - [`oracle`]: the ordered prime cache that maps prime indices to primes and back
//! - [`factorizer`]: trial-division factorization on top of the oracle
//! - [`spectral`]: the small modular transform run over spectral regions

pub mod factorizer;
pub mod oracle;
pub mod spectral;

/// A prime power `prime(index)^exponent`, named by the prime's index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Factor {
    pub index: usize,
    pub exponent: u32,
}

impl Factor {
    pub const fn new(index: usize, exponent: u32) -> Self {
        Self { index, exponent }
    }
}
