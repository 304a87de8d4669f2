//! Stack machine whose instructions are prime-factorized integers.
//!
//! Every chunk of program memory is one integer. Its prime factorization
//! carries the instruction: the opcode is the prime raised to the 4th power, a
//! PUSH operand the prime raised to the 5th, and a checksum prime raised to the
//! 6th validates the rest. Stack values are prime indices.
//!
//! # Architecture
//!
//! - **Operand stack**: a single stack of arbitrary-precision words, shared by
//!   nested regions and used for CALL/RETURN bookkeeping
//! - **Program memory**: self-modifiable through POKE and BUILD
//! - **Regions**: block and spectral headers run the following chunks as a
//!   nested frame over the same memory
//! - **Suspension**: INPUT is the only point where a run waits for its caller
//! - **Budget**: every dispatch counts against a hard instruction budget
//!
//! # Modules
//!
//! - [`assembler`]: Mnemonic source to chunks, with diagnostics
//! - [`codec`]: Chunk constructors (logical factors to checksummed integers)
//! - [`decode`]: Checksum verification and chunk classification
//! - [`disassembler`]: Chunk to human-readable description
//! - [`entropy`]: Randomness source behind RANDOM
//! - [`errors`]: Fault taxonomy, session and program errors
//! - [`isa`]: Opcode table and encoding exponents
//! - [`operand`]: Stack words and their conversion to machine quantities
//! - [`program`]: Program memory and its text format
//! - [`state`]: Machine lifecycle and step records
//! - [`vm`]: The interpreter

pub mod assembler;
pub mod codec;
pub mod decode;
pub mod disassembler;
pub mod entropy;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod state;
pub mod vm;
