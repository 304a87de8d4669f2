//! Human-readable rendering of chunks.
//!
//! Every chunk has a description, including ones the interpreter would reject,
//! so listings never stop at the first bad chunk.

use crate::primes::Factor;
use crate::primes::factorizer::factor_indexed;
use crate::primes::oracle::PrimeOracle;
use crate::virtual_machine::decode::{ChecksumPolicy, DecodeError, Decoded, decode};
use crate::virtual_machine::operand::Word;
use num_traits::Zero;
use std::fmt::Write;

/// One-line description of a chunk: `PUSH 8`, `ADD`, `BLOCK 3`, `DATA 1 72`,
/// `INERT`, `ZERO` or `INVALID (<reason>)`.
pub fn describe(oracle: &mut PrimeOracle, chunk: &Word) -> String {
    if chunk.is_zero() {
        return "ZERO".to_string();
    }
    match decode(oracle, chunk, ChecksumPolicy::Strict) {
        Ok(decoded) => render(&decoded),
        Err(DecodeError::ChecksumMismatch { .. }) => {
            let err = DecodeError::ChecksumMismatch {
                chunk: chunk.clone(),
            };
            match factor_indexed(oracle, chunk) {
                Ok(factors) => format!(
                    "INVALID ({err}; raw factors {})",
                    render_factors(oracle, &factors)
                ),
                Err(_) => format!("INVALID ({err})"),
            }
        }
        Err(err) => format!("INVALID ({err})"),
    }
}

fn render(decoded: &Decoded) -> String {
    match decoded {
        Decoded::Inert => "INERT".to_string(),
        Decoded::Instruction {
            opcode,
            operand: Some(index),
        } => format!("{} {index}", opcode.mnemonic()),
        Decoded::Instruction {
            opcode,
            operand: None,
        } => opcode.mnemonic().to_string(),
        Decoded::Region { kind, length } => format!("{} {length}", kind.keyword()),
        Decoded::Data { position, payload } => format!("DATA {position} {payload}"),
    }
}

/// Renders factors as `p^e` products, falling back to `#index^e` past the oracle limit.
fn render_factors(oracle: &mut PrimeOracle, factors: &[Factor]) -> String {
    factors
        .iter()
        .map(|f| match oracle.prime_at(f.index) {
            Ok(p) if f.exponent == 1 => p.to_string(),
            Ok(p) => format!("{p}^{}", f.exponent),
            Err(_) => format!("#{}^{}", f.index, f.exponent),
        })
        .collect::<Vec<_>>()
        .join(" * ")
}

/// Address-prefixed listing of a whole program, one chunk per line.
pub fn disassemble(oracle: &mut PrimeOracle, chunks: &[Word]) -> String {
    let mut out = String::new();
    for (address, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(out, "{address:>5}  {}", describe(oracle, chunk));
    }
    out
}
