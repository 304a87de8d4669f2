//! Chunk decoding: checksum verification, then classification of the logical
//! factors into an instruction, a region header, a data cell or an inert chunk.
//!
//! Every factor with exponent at least 6 is tried as the checksum, in increasing
//! prime order. A candidate verifies when its index equals the XOR of
//! `index * exponent` over all other factors plus its own residual exponent
//! (`e - 6`). That is exactly the quantity the encoder computed, so merged
//! factors and 7th-power header tags decode back to what was built.

use crate::primes::Factor;
use crate::primes::factorizer::{FactorError, factor_indexed};
use crate::primes::oracle::PrimeOracle;
use crate::virtual_machine::codec::weight;
use crate::virtual_machine::errors::FaultKind;
use crate::virtual_machine::isa::{
    CHECKSUM_EXPONENT, DATA_CELL_EXPONENT, DATA_PAYLOAD_EXPONENT, DATA_POSITION_EXPONENT,
    LENGTH_EXPONENT, OPCODE_EXPONENT, OPERAND_EXPONENT, Opcode, RegionKind,
};
use crate::virtual_machine::operand::Word;
use chunkvm_derive::Error;
use num_traits::{One, Zero};

/// What to do with a chunk whose checksum does not verify.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Reject it. Used for instruction fetch.
    Strict,
    /// Keep every factor as logical. Used where a chunk is data being inspected.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("raw zero chunk")]
    Zero,
    #[error("cannot factor chunk: {reason}")]
    Unfactorable { reason: FactorError },
    #[error("{chunk} carries no verifying checksum factor")]
    ChecksumMismatch { chunk: Word },
    #[error("no factor carries the opcode exponent 4")]
    MissingOpcode,
    #[error("{candidates} factors carry the opcode exponent 4")]
    AmbiguousOpcode { candidates: usize },
    #[error("prime index {index} is not an opcode")]
    UnknownOpcode { index: usize },
    #[error("malformed {what}: {reason}")]
    Malformed {
        what: &'static str,
        reason: &'static str,
    },
    #[error("data cell (position {position}, payload {payload}) is not executable")]
    DataCell { position: usize, payload: usize },
}

impl DecodeError {
    pub fn kind(&self) -> FaultKind {
        match self {
            DecodeError::Zero
            | DecodeError::Unfactorable { .. }
            | DecodeError::ChecksumMismatch { .. } => FaultKind::Integrity,
            DecodeError::MissingOpcode
            | DecodeError::AmbiguousOpcode { .. }
            | DecodeError::Malformed { .. }
            | DecodeError::DataCell { .. } => FaultKind::Decode,
            DecodeError::UnknownOpcode { .. } => FaultKind::UnknownOpcode,
        }
    }
}

/// A classified chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// `1`, or a chunk with no logical factors.
    Inert,
    Instruction {
        opcode: Opcode,
        operand: Option<usize>,
    },
    /// Header of a region spanning the next `length` chunks.
    Region { kind: RegionKind, length: usize },
    Data { position: usize, payload: usize },
}

/// Removes the verifying checksum factor, or returns `None` if no candidate verifies.
pub fn strip_checksum(factors: &[Factor]) -> Option<Vec<Factor>> {
    factors
        .iter()
        .enumerate()
        .filter(|(_, f)| f.exponent >= CHECKSUM_EXPONENT)
        .find_map(|(i, candidate)| {
            let residual = candidate.exponent - CHECKSUM_EXPONENT;
            let mut expected = weight(&Factor::new(candidate.index, residual))?;
            for (j, other) in factors.iter().enumerate() {
                if j != i {
                    expected ^= weight(other)?;
                }
            }
            (expected == candidate.index).then(|| {
                factors
                    .iter()
                    .enumerate()
                    .filter_map(|(j, f)| match j == i {
                        true => (residual > 0).then(|| Factor::new(f.index, residual)),
                        false => Some(*f),
                    })
                    .collect()
            })
        })
}

/// Factors `chunk` and strips its checksum.
///
/// `0` is always rejected; `1` has no factors and needs no checksum.
pub fn logical_factors(
    oracle: &mut PrimeOracle,
    chunk: &Word,
    policy: ChecksumPolicy,
) -> Result<Vec<Factor>, DecodeError> {
    if chunk.is_zero() {
        return Err(DecodeError::Zero);
    }
    if chunk.is_one() {
        return Ok(Vec::new());
    }

    let factors = factor_indexed(oracle, chunk)
        .map_err(|reason| DecodeError::Unfactorable { reason })?;

    match (strip_checksum(&factors), policy) {
        (Some(logical), _) => Ok(logical),
        (None, ChecksumPolicy::Lenient) => Ok(factors),
        (None, ChecksumPolicy::Strict) => Err(DecodeError::ChecksumMismatch {
            chunk: chunk.clone(),
        }),
    }
}

/// Decodes a chunk.
pub fn decode(
    oracle: &mut PrimeOracle,
    chunk: &Word,
    policy: ChecksumPolicy,
) -> Result<Decoded, DecodeError> {
    classify(&logical_factors(oracle, chunk, policy)?)
}

/// Classifies a normalized logical factor list (unique indices, ascending).
pub fn classify(factors: &[Factor]) -> Result<Decoded, DecodeError> {
    if factors.is_empty() {
        return Ok(Decoded::Inert);
    }
    if let Some(region) = region_header(factors)? {
        return Ok(region);
    }

    let mut candidates = factors.iter().filter(|f| f.exponent == OPCODE_EXPONENT);
    let Some(opcode_factor) = candidates.next() else {
        // PUSH 0 merges opcode and operand into 2^9.
        if let [only] = factors
            && only.index == Opcode::Push.prime_index()
            && only.exponent == OPCODE_EXPONENT + OPERAND_EXPONENT
        {
            return Ok(Decoded::Instruction {
                opcode: Opcode::Push,
                operand: Some(Opcode::Push.prime_index()),
            });
        }
        return data_cell(factors).ok_or(DecodeError::MissingOpcode);
    };

    let others = candidates.count();
    if others > 0 {
        return Err(DecodeError::AmbiguousOpcode {
            candidates: others + 1,
        });
    }

    let opcode = Opcode::from_prime_index(opcode_factor.index).ok_or(
        DecodeError::UnknownOpcode {
            index: opcode_factor.index,
        },
    )?;
    let rest: Vec<&Factor> = factors
        .iter()
        .filter(|f| f.index != opcode_factor.index)
        .collect();

    match (opcode.has_operand(), rest.as_slice()) {
        (true, [operand]) if operand.exponent == OPERAND_EXPONENT => Ok(Decoded::Instruction {
            opcode,
            operand: Some(operand.index),
        }),
        (true, _) => Err(DecodeError::Malformed {
            what: opcode.mnemonic(),
            reason: "expected one operand factor with exponent 5",
        }),
        (false, []) => Ok(Decoded::Instruction {
            opcode,
            operand: None,
        }),
        (false, _) => Err(DecodeError::Malformed {
            what: opcode.mnemonic(),
            reason: "unexpected factors beside the opcode",
        }),
    }
}

fn region_header(factors: &[Factor]) -> Result<Option<Decoded>, DecodeError> {
    for kind in RegionKind::ALL {
        let tag = kind.tag_index();
        let Some(tag_factor) = factors.iter().find(|f| f.index == tag) else {
            continue;
        };

        if tag_factor.exponent == kind.tag_exponent() {
            let rest: Vec<&Factor> = factors.iter().filter(|f| f.index != tag).collect();
            return match rest.as_slice() {
                [length] if length.exponent == LENGTH_EXPONENT => Ok(Some(Decoded::Region {
                    kind,
                    length: length.index,
                })),
                _ => Err(DecodeError::Malformed {
                    what: kind.keyword(),
                    reason: "expected one length factor with exponent 5",
                }),
            };
        }

        // A region whose length equals its own tag index merges into one factor.
        if factors.len() == 1 && tag_factor.exponent == kind.tag_exponent() + LENGTH_EXPONENT {
            return Ok(Some(Decoded::Region { kind, length: tag }));
        }
    }
    Ok(None)
}

fn data_cell(factors: &[Factor]) -> Option<Decoded> {
    match factors {
        [cell] if cell.exponent == DATA_CELL_EXPONENT => Some(Decoded::Data {
            position: cell.index,
            payload: cell.index,
        }),
        [a, b] => match (a.exponent, b.exponent) {
            (DATA_POSITION_EXPONENT, DATA_PAYLOAD_EXPONENT) => Some(Decoded::Data {
                position: a.index,
                payload: b.index,
            }),
            (DATA_PAYLOAD_EXPONENT, DATA_POSITION_EXPONENT) => Some(Decoded::Data {
                position: b.index,
                payload: a.index,
            }),
            _ => None,
        },
        _ => None,
    }
}
