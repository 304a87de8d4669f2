//! Stack words and how instructions read them.
//!
//! Every stack cell and every chunk is a [`Word`]. Instructions that need a
//! machine-sized quantity (an address, a prime index, an exponent) convert the
//! popped word here and fault when it does not fit.

use crate::virtual_machine::errors::VmError;
use num_bigint::BigUint;
use num_traits::ToPrimitive;

/// Arbitrary-precision unsigned integer used for chunks and stack values.
pub type Word = BigUint;

/// How an instruction interprets a popped word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandRole {
    /// Program address; range failures are bounds faults.
    Address,
    PrimeIndex,
    Exponent,
    Count,
    Bound,
}

impl OperandRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperandRole::Address => "address",
            OperandRole::PrimeIndex => "prime index",
            OperandRole::Exponent => "exponent",
            OperandRole::Count => "count",
            OperandRole::Bound => "bound",
        }
    }
}

/// Reads `word` as a `usize` in the given role.
pub fn to_usize(instruction: &'static str, role: OperandRole, word: &Word) -> Result<usize, VmError> {
    word.to_usize().ok_or_else(|| range_error(instruction, role, word))
}

/// Reads `word` as a `u64` in the given role.
pub fn to_u64(instruction: &'static str, role: OperandRole, word: &Word) -> Result<u64, VmError> {
    word.to_u64().ok_or_else(|| range_error(instruction, role, word))
}

/// Reads `word` as a `u32` in the given role.
pub fn to_u32(instruction: &'static str, role: OperandRole, word: &Word) -> Result<u32, VmError> {
    word.to_u32().ok_or_else(|| range_error(instruction, role, word))
}

/// Parses a plain decimal token (ASCII digits only, no sign or separators).
pub fn parse_word(token: &str) -> Option<Word> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn range_error(instruction: &'static str, role: OperandRole, word: &Word) -> VmError {
    match role {
        OperandRole::Address => VmError::OutOfBounds {
            instruction,
            target: word.clone(),
            limit: usize::MAX,
        },
        _ => VmError::OperandRange {
            instruction,
            role: role.as_str(),
            value: word.clone(),
        },
    }
}
