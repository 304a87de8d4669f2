//! Number-theoretic transform over a small prime modulus.
//!
//! The interpreter runs the payloads of a spectral region through
//! [`forward`] and [`inverse`] as a self-check. Nothing observable depends on
//! the result. With root 2 modulo 13 the pair is an exact inverse only for
//! sequences of length 1 or 12, since 2 has multiplicative order 12.

use chunkvm_derive::Error;

/// Prime index of the transform modulus (`prime(5) = 13`). Reserved in the ISA.
pub const MODULUS_INDEX: usize = 5;
pub const MODULUS: u64 = 13;
pub const ROOT: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpectralError {
    #[error("{value} has no inverse modulo {modulus}")]
    NoInverse { value: u64, modulus: u64 },
}

/// `out[k] = sum(values[n] * root^(n*k)) mod modulus`.
pub fn forward(values: &[u64], modulus: u64, root: u64) -> Vec<u64> {
    transform(values, modulus, root)
}

/// Inverse of [`forward`]: negated exponents via the inverse of `root`,
/// scaled by the inverse of the sequence length.
pub fn inverse(values: &[u64], modulus: u64, root: u64) -> Result<Vec<u64>, SpectralError> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    let root_inv = inverse_mod(root, modulus)?;
    let len_inv = inverse_mod(values.len() as u64 % modulus, modulus)?;
    Ok(transform(values, modulus, root_inv)
        .into_iter()
        .map(|v| mul_mod(v, len_inv, modulus))
        .collect())
}

/// Outcome of running a spectral region's payloads through the transform pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundTrip {
    /// `inverse(forward(x)) == x mod MODULUS`.
    Exact,
    /// The pair did not reproduce the input.
    Mismatch { expected: Vec<u64>, actual: Vec<u64> },
}

/// Runs `payloads` (reduced mod [`MODULUS`]) through forward then inverse with the
/// fixed modulus and root.
pub fn round_trip(payloads: &[u64]) -> Result<RoundTrip, SpectralError> {
    let expected: Vec<u64> = payloads.iter().map(|v| v % MODULUS).collect();
    let actual = inverse(&forward(&expected, MODULUS, ROOT), MODULUS, ROOT)?;
    if actual == expected {
        Ok(RoundTrip::Exact)
    } else {
        Ok(RoundTrip::Mismatch { expected, actual })
    }
}

fn transform(values: &[u64], modulus: u64, root: u64) -> Vec<u64> {
    let len = values.len() as u64;
    (0..len)
        .map(|k| {
            values.iter().zip(0u64..).fold(0, |acc, (&v, n)| {
                let term = mul_mod(v % modulus, pow_mod(root, n * k, modulus), modulus);
                (acc + term) % modulus
            })
        })
        .collect()
}

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(modulus)) as u64
}

fn pow_mod(base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut result = 1 % modulus;
    let mut base = base % modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    result
}

/// Extended Euclid; fails when `gcd(value, modulus) != 1`.
fn inverse_mod(value: u64, modulus: u64) -> Result<u64, SpectralError> {
    let (mut r0, mut r1) = (i128::from(modulus), i128::from(value % modulus));
    let (mut t0, mut t1) = (0i128, 1i128);
    while r1 != 0 {
        let q = r0 / r1;
        (r0, r1) = (r1, r0 - q * r1);
        (t0, t1) = (t1, t0 - q * t1);
    }
    if r0 != 1 {
        return Err(SpectralError::NoInverse { value, modulus });
    }
    Ok(t0.rem_euclid(i128::from(modulus)) as u64)
}
