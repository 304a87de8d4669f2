//! Trial-division factorization over the prime oracle.

use crate::primes::Factor;
use crate::primes::oracle::{OracleError, PrimeOracle};
use chunkvm_derive::Error;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactorError {
    /// Zero has no prime factorization.
    #[error("only positive integers can be factored")]
    NonPositiveInput,
    /// The oracle limit was reached before the remaining cofactor was resolved.
    #[error("{value} has a cofactor beyond the reach of the prime oracle")]
    LimitExceeded { value: BigUint },
    #[error("prime oracle: {0}")]
    Oracle(#[from] OracleError),
}

/// Factors `n` into `(prime, exponent)` pairs in increasing prime order.
///
/// Divides by successive oracle primes while `p * p` does not exceed the
/// remaining cofactor. A cofactor left over after that is prime and is
/// appended with exponent 1. `factor(1)` is empty.
pub fn factor(oracle: &mut PrimeOracle, n: &BigUint) -> Result<Vec<(u64, u32)>, FactorError> {
    if n.is_zero() {
        return Err(FactorError::NonPositiveInput);
    }

    let mut rest = n.clone();
    let mut out = Vec::new();
    let mut index = 0usize;

    while !rest.is_one() {
        let p = match oracle.prime_at(index) {
            Ok(p) => p,
            Err(OracleError::InvalidIndex { .. }) => {
                return Err(FactorError::LimitExceeded { value: n.clone() });
            }
            Err(e) => return Err(e.into()),
        };

        let square = u128::from(p) * u128::from(p);
        if rest.to_u128().is_some_and(|r| square > r) {
            // No prime up to sqrt(rest) divides it.
            let prime = rest
                .to_u64()
                .ok_or_else(|| FactorError::LimitExceeded { value: n.clone() })?;
            out.push((prime, 1));
            break;
        }

        let mut exponent = 0u32;
        while (&rest % p).is_zero() {
            rest /= p;
            exponent += 1;
        }
        if exponent > 0 {
            out.push((p, exponent));
        }
        index += 1;
    }

    Ok(out)
}

/// Factors `n` and names every prime by its oracle index.
pub fn factor_indexed(oracle: &mut PrimeOracle, n: &BigUint) -> Result<Vec<Factor>, FactorError> {
    factor(oracle, n)?
        .into_iter()
        .map(|(prime, exponent)| Ok(Factor::new(oracle.resolve_index(prime)?, exponent)))
        .collect()
}

/// Multiplies `prime(index)^exponent` over all factors.
pub fn product(oracle: &mut PrimeOracle, factors: &[Factor]) -> Result<BigUint, OracleError> {
    let mut out = BigUint::one();
    for f in factors {
        let p = BigUint::from(oracle.prime_at(f.index)?);
        out *= p.pow(f.exponent);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn zero_is_rejected() {
        let mut oracle = PrimeOracle::new();
        assert_eq!(
            factor(&mut oracle, &BigUint::zero()),
            Err(FactorError::NonPositiveInput)
        );
    }

    #[test]
    fn one_has_no_factors() {
        let mut oracle = PrimeOracle::new();
        assert!(factor(&mut oracle, &big(1)).unwrap().is_empty());
    }

    #[test]
    fn small_composites() {
        let mut oracle = PrimeOracle::new();
        assert_eq!(factor(&mut oracle, &big(360)).unwrap(), vec![(2, 3), (3, 2), (5, 1)]);
        assert_eq!(factor(&mut oracle, &big(7919)).unwrap(), vec![(7919, 1)]);
        assert_eq!(
            factor(&mut oracle, &big(2 * 7919 * 7919)).unwrap(),
            vec![(2, 1), (7919, 2)]
        );
    }

    #[test]
    fn leftover_cofactor_is_prime() {
        let mut oracle = PrimeOracle::new();
        // 1_000_003 is prime; trial division stops at 1_000.
        let factors = factor(&mut oracle, &big(4 * 1_000_003)).unwrap();
        assert_eq!(factors, vec![(2, 2), (1_000_003, 1)]);
        assert!(oracle.largest() < 1_100);
    }

    #[test]
    fn beyond_u128() {
        let mut oracle = PrimeOracle::new();
        let n = BigUint::from(3u32).pow(90) * BigUint::from(13u32).pow(7);
        assert_eq!(factor(&mut oracle, &n).unwrap(), vec![(3, 90), (13, 7)]);
    }

    #[test]
    fn limit_exceeded() {
        let mut oracle = PrimeOracle::with_limit(3);
        // 7 * 7 needs the fourth prime.
        assert_eq!(
            factor(&mut oracle, &big(49)),
            Err(FactorError::LimitExceeded { value: big(49) })
        );
    }

    #[test]
    fn indexed_and_product_agree() {
        let mut oracle = PrimeOracle::new();
        let n = big(2u64.pow(4) * 11u64.pow(5) * 13);
        let factors = factor_indexed(&mut oracle, &n).unwrap();
        assert_eq!(
            factors,
            vec![Factor::new(0, 4), Factor::new(4, 5), Factor::new(5, 1)]
        );
        assert_eq!(product(&mut oracle, &factors).unwrap(), n);
    }
}
