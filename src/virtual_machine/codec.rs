//! Chunk construction.
//!
//! A chunk is the product of its logical factors times a checksum factor
//! `prime(c)^6`, where `c` is the XOR over all logical factors of
//! `index * exponent`. Logical factors are normalized before encoding (same
//! index merged, zero exponents dropped, sorted by index) so that the checksum
//! is computed over exactly the factorization a decoder will see.
//!
//! Decoding lives in [`decode`](super::decode).

use crate::for_each_opcode;
use crate::primes::Factor;
use crate::primes::factorizer::product;
use crate::primes::oracle::{OracleError, PrimeOracle};
use crate::virtual_machine::isa::{
    CHECKSUM_EXPONENT, DATA_CELL_EXPONENT, DATA_PAYLOAD_EXPONENT, DATA_POSITION_EXPONENT,
    LENGTH_EXPONENT, OPCODE_EXPONENT, OPERAND_EXPONENT, Opcode, RegionKind,
};
use crate::virtual_machine::operand::Word;
use chunkvm_derive::Error;
use std::collections::BTreeMap;

/// Largest exponent a single logical factor may carry.
pub const MAX_FACTOR_EXPONENT: u32 = 4_096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("exponent {exponent} of prime index {index} exceeds {limit}")]
    ExponentTooLarge {
        index: usize,
        exponent: u64,
        limit: u32,
    },
    #[error("checksum weight of prime index {index} with exponent {exponent} overflows")]
    ChecksumOverflow { index: usize, exponent: u32 },
    #[error("prime oracle: {0}")]
    Oracle(#[from] OracleError),
}

/// Merges factors with the same index, drops zero exponents and sorts by index.
pub fn normalize(factors: &[Factor]) -> Result<Vec<Factor>, CodecError> {
    let mut merged: BTreeMap<usize, u64> = BTreeMap::new();
    for f in factors {
        *merged.entry(f.index).or_default() += u64::from(f.exponent);
    }

    merged
        .into_iter()
        .filter(|&(_, exponent)| exponent > 0)
        .map(|(index, exponent)| match u32::try_from(exponent) {
            Ok(e) if e <= MAX_FACTOR_EXPONENT => Ok(Factor::new(index, e)),
            _ => Err(CodecError::ExponentTooLarge {
                index,
                exponent,
                limit: MAX_FACTOR_EXPONENT,
            }),
        })
        .collect()
}

/// XOR of `index * exponent` over `factors`.
pub fn checksum_index(factors: &[Factor]) -> Result<usize, CodecError> {
    factors.iter().try_fold(0usize, |acc, f| {
        let weight = weight(f).ok_or(CodecError::ChecksumOverflow {
            index: f.index,
            exponent: f.exponent,
        })?;
        Ok(acc ^ weight)
    })
}

/// Checksum contribution of one factor, `None` on overflow.
pub(crate) fn weight(f: &Factor) -> Option<usize> {
    f.index.checked_mul(f.exponent as usize)
}

/// Encodes logical factors into a checksummed chunk.
pub fn encode(oracle: &mut PrimeOracle, factors: &[Factor]) -> Result<Word, CodecError> {
    let logical = normalize(factors)?;
    let checksum = oracle.prime_at(checksum_index(&logical)?)?;
    let raw = product(oracle, &logical)?;
    Ok(raw * Word::from(checksum).pow(CHECKSUM_EXPONENT))
}

/// Encodes an instruction. `operand` is only meaningful for PUSH.
pub fn instruction(
    oracle: &mut PrimeOracle,
    opcode: Opcode,
    operand: Option<usize>,
) -> Result<Word, CodecError> {
    let mut factors = vec![Factor::new(opcode.prime_index(), OPCODE_EXPONENT)];
    if let Some(index) = operand {
        factors.push(Factor::new(index, OPERAND_EXPONENT));
    }
    encode(oracle, &factors)
}

/// Encodes a region header announcing `length` following chunks.
pub fn region_header(
    oracle: &mut PrimeOracle,
    kind: RegionKind,
    length: usize,
) -> Result<Word, CodecError> {
    encode(
        oracle,
        &[
            Factor::new(kind.tag_index(), kind.tag_exponent()),
            Factor::new(length, LENGTH_EXPONENT),
        ],
    )
}

/// Plain block header: `7^7 * prime(length)^5`, checksummed.
pub fn block_header(oracle: &mut PrimeOracle, length: usize) -> Result<Word, CodecError> {
    region_header(oracle, RegionKind::Block, length)
}

/// Spectral block header: `11^4 * prime(length)^5`, checksummed.
pub fn spectral_header(oracle: &mut PrimeOracle, length: usize) -> Result<Word, CodecError> {
    region_header(oracle, RegionKind::Spectral, length)
}

/// Positional data cell. Collapses to `prime(position)^3` when the position
/// equals the payload, else `prime(position) * prime(payload)^2`.
pub fn data_cell(
    oracle: &mut PrimeOracle,
    position: usize,
    payload: usize,
) -> Result<Word, CodecError> {
    if position == payload {
        encode(oracle, &[Factor::new(position, DATA_CELL_EXPONENT)])
    } else {
        encode(
            oracle,
            &[
                Factor::new(position, DATA_POSITION_EXPONENT),
                Factor::new(payload, DATA_PAYLOAD_EXPONENT),
            ],
        )
    }
}

macro_rules! define_constructors {
    (@ctor $name:ident, $ctor:ident, $mnemonic:literal, []) => {
        #[doc = concat!("Encodes a `", $mnemonic, "` chunk.")]
        pub fn $ctor(oracle: &mut PrimeOracle) -> Result<Word, CodecError> {
            instruction(oracle, Opcode::$name, None)
        }
    };
    (@ctor $name:ident, $ctor:ident, $mnemonic:literal, [ $operand:ident ]) => {
        #[doc = concat!("Encodes a `", $mnemonic, "` chunk carrying prime index `", stringify!($operand), "`.")]
        pub fn $ctor(oracle: &mut PrimeOracle, $operand: usize) -> Result<Word, CodecError> {
            instruction(oracle, Opcode::$name, Some($operand))
        }
    };

    (
        $(
            $(#[$doc:meta])*
            $name:ident = $index:literal, $mnemonic:literal, $ctor:ident => [ $( $operand:ident )? ], $category:ident
        ),* $(,)?
    ) => {
        $( define_constructors!(@ctor $name, $ctor, $mnemonic, [ $( $operand )? ]); )*
    };
}

for_each_opcode!(define_constructors);
