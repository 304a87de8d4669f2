//! Prime oracle.
//!
//! Primes are generated in strictly increasing order by trial division against
//! the primes already cached, so `prime_at(k)` is the same on every run and in
//! every instance. Index 0 is 2.

use chunkvm_derive::Error;
use std::collections::HashMap;

/// Default cap on the number of cached primes (the last one is 16_290_047).
pub const DEFAULT_PRIME_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The index lies beyond the number of primes the oracle may cache.
    #[error("prime index {index} is beyond the oracle limit of {limit} primes")]
    InvalidIndex { index: usize, limit: usize },
    /// The value is not a prime the oracle has cached.
    #[error("{value} is not a cached prime")]
    UnknownPrime { value: u64 },
}

/// Ordered, monotonically growing prime cache.
///
/// The oracle never shrinks and never reassigns an index. Growth is bounded by
/// a limit on the number of cached primes so that a hostile chunk cannot make
/// factorization run forever.
#[derive(Debug, Clone)]
pub struct PrimeOracle {
    primes: Vec<u64>,
    indices: HashMap<u64, usize>,
    limit: usize,
}

impl PrimeOracle {
    /// Creates an oracle seeded with `2` and the default limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_PRIME_LIMIT)
    }

    /// Creates an oracle that caches at most `limit` primes (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            primes: vec![2],
            indices: HashMap::from([(2, 0)]),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of primes cached so far.
    pub fn cached(&self) -> usize {
        self.primes.len()
    }

    /// Largest cached prime.
    pub fn largest(&self) -> u64 {
        self.primes.last().copied().unwrap_or(2)
    }

    /// Returns the `index`-th prime, growing the cache as needed.
    pub fn prime_at(&mut self, index: usize) -> Result<u64, OracleError> {
        self.extend_to(index)?;
        Ok(self.primes[index])
    }

    /// Returns the index of an already cached prime.
    pub fn index_of(&self, prime: u64) -> Result<usize, OracleError> {
        self.indices
            .get(&prime)
            .copied()
            .ok_or(OracleError::UnknownPrime { value: prime })
    }

    /// Returns the index of `value`, growing the cache until it covers `value`.
    ///
    /// Fails with [`OracleError::UnknownPrime`] when `value` is composite.
    pub fn resolve_index(&mut self, value: u64) -> Result<usize, OracleError> {
        self.extend_past(value)?;
        self.index_of(value)
    }

    /// Ensures the cache holds at least `index + 1` primes.
    pub fn extend_to(&mut self, index: usize) -> Result<(), OracleError> {
        if index >= self.limit {
            return Err(OracleError::InvalidIndex {
                index,
                limit: self.limit,
            });
        }
        while self.primes.len() <= index {
            self.push_next();
        }
        Ok(())
    }

    /// Ensures the largest cached prime is at least `value`.
    pub fn extend_past(&mut self, value: u64) -> Result<(), OracleError> {
        while self.largest() < value {
            if self.primes.len() >= self.limit {
                return Err(OracleError::InvalidIndex {
                    index: self.primes.len(),
                    limit: self.limit,
                });
            }
            self.push_next();
        }
        Ok(())
    }

    fn push_next(&mut self) {
        let last = self.largest();
        let mut candidate = if last == 2 { 3 } else { last + 2 };
        while self.has_cached_divisor(candidate) {
            candidate += 2;
        }
        self.indices.insert(candidate, self.primes.len());
        self.primes.push(candidate);
    }

    fn has_cached_divisor(&self, candidate: u64) -> bool {
        self.primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .any(|&p| candidate % p == 0)
    }
}

impl Default for PrimeOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_with_two() {
        let oracle = PrimeOracle::new();
        assert_eq!(oracle.cached(), 1);
        assert_eq!(oracle.index_of(2), Ok(0));
    }

    #[test]
    fn first_primes_in_order() {
        let mut oracle = PrimeOracle::new();
        let first: Vec<u64> = (0..12).map(|i| oracle.prime_at(i).unwrap()).collect();
        assert_eq!(first, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37]);
    }

    #[test]
    fn known_far_indices() {
        let mut oracle = PrimeOracle::new();
        assert_eq!(oracle.prime_at(96).unwrap(), 509);
        assert_eq!(oracle.prime_at(999).unwrap(), 7919);
        assert_eq!(oracle.index_of(7919), Ok(999));
    }

    #[test]
    fn instances_agree() {
        let mut a = PrimeOracle::new();
        let mut b = PrimeOracle::new();
        b.extend_to(300).unwrap();
        for i in (0..300).rev() {
            assert_eq!(a.prime_at(i).unwrap(), b.prime_at(i).unwrap());
        }
    }

    #[test]
    fn index_of_requires_cached_prime() {
        let oracle = PrimeOracle::new();
        assert_eq!(
            oracle.index_of(13),
            Err(OracleError::UnknownPrime { value: 13 })
        );
    }

    #[test]
    fn resolve_index_grows_cache() {
        let mut oracle = PrimeOracle::new();
        assert_eq!(oracle.resolve_index(13), Ok(5));
        assert!(oracle.largest() >= 13);
        assert_eq!(
            oracle.resolve_index(15),
            Err(OracleError::UnknownPrime { value: 15 })
        );
    }

    #[test]
    fn limit_is_enforced() {
        let mut oracle = PrimeOracle::with_limit(4);
        assert_eq!(oracle.prime_at(3), Ok(7));
        assert_eq!(
            oracle.prime_at(4),
            Err(OracleError::InvalidIndex { index: 4, limit: 4 })
        );
        assert_eq!(
            oracle.extend_past(8),
            Err(OracleError::InvalidIndex { index: 4, limit: 4 })
        );
    }

    #[test]
    fn extend_past_stops_at_first_cover() {
        let mut oracle = PrimeOracle::new();
        oracle.extend_past(20).unwrap();
        assert_eq!(oracle.largest(), 23);
        assert_eq!(oracle.cached(), 9);
    }
}
