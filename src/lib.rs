//! Prime-factorization chunk virtual machine.
//!
//! Provides the prime oracle and factorizer, the chunk codec, and a resumable
//! interpreter with an assembler and disassembler.

pub mod primes;
pub mod utils;
pub mod virtual_machine;
