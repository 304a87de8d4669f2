//! Instruction set definitions.
//!
//! Every opcode is a prime index. An instruction chunk carries its opcode prime
//! raised to [`OPCODE_EXPONENT`]; PUSH additionally carries its operand's prime
//! raised to [`OPERAND_EXPONENT`]. The [`for_each_opcode!`](crate::for_each_opcode)
//! macro holds the canonical opcode table and hands it to a callback macro, so
//! the enum below, the codec constructors and the ISA stability check are all
//! generated from one list.
//!
//! Prime indices 3, 4 and 5 are not opcodes: 3 tags plain blocks, 4 tags
//! spectral blocks and 5 is the spectral transform modulus.

use crate::virtual_machine::vm::budget::DispatchCategory;

/// Exponent of the opcode prime in an instruction chunk.
pub const OPCODE_EXPONENT: u32 = 4;
/// Exponent of the operand prime in a PUSH chunk.
pub const OPERAND_EXPONENT: u32 = 5;
/// Exponent of the checksum prime attached to every constructed chunk.
pub const CHECKSUM_EXPONENT: u32 = 6;
/// Exponent of the length prime in a region header.
pub const LENGTH_EXPONENT: u32 = 5;
/// Exponent of a data cell whose position equals its payload.
pub const DATA_CELL_EXPONENT: u32 = 3;
pub const DATA_POSITION_EXPONENT: u32 = 1;
pub const DATA_PAYLOAD_EXPONENT: u32 = 2;

/// COMPARE_EQ result for equal operands (index of 3).
pub const TRUE_INDEX: usize = 1;
/// COMPARE_EQ result for unequal operands; also the JUMP_IF_ZERO trigger.
pub const FALSE_INDEX: usize = 0;

/// Kind of sub-region introduced by a header chunk.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegionKind {
    /// Plain framing block: `7^7 * prime(length)^5`.
    Block,
    /// Spectral block: `11^4 * prime(length)^5`, payloads are transform-checked.
    Spectral,
}

impl RegionKind {
    pub const ALL: [RegionKind; 2] = [RegionKind::Block, RegionKind::Spectral];

    /// Prime index of the header tag.
    pub const fn tag_index(self) -> usize {
        match self {
            RegionKind::Block => 3,
            RegionKind::Spectral => 4,
        }
    }

    /// Exponent of the header tag.
    pub const fn tag_exponent(self) -> u32 {
        match self {
            RegionKind::Block => 7,
            RegionKind::Spectral => 4,
        }
    }

    /// Assembly keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            RegionKind::Block => "BLOCK",
            RegionKind::Spectral => "SPECTRAL",
        }
    }
}

/// Invokes a callback macro with the complete opcode table.
///
/// Row format: `Name = prime_index, "MNEMONIC", constructor => [operand?], Category`.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stack
            // =========================
            /// PUSH k ; push prime index k
            Push = 0, "PUSH", push => [operand], Stack,
            /// DUP ; duplicate the top value
            Dup = 6, "DUP", dup => [], Stack,
            /// SWAP ; exchange the top two values
            Swap = 7, "SWAP", swap => [], Stack,
            /// DROP ; discard the top value
            Drop = 8, "DROP", drop => [], Stack,
            // =========================
            // Arithmetic
            // =========================
            /// ADD ; pop b, a ; push a + b
            Add = 1, "ADD", add => [], Arithmetic,
            /// COMPARE_EQ ; pop b, a ; push 1 if a == b else 0
            CompareEq = 16, "COMPARE_EQ", compare_eq => [], Arithmetic,
            /// MOD ; pop m, v ; push v mod m (m = 0 faults)
            Mod = 22, "MOD", modulo => [], Arithmetic,
            /// RANDOM ; pop n ; push a uniform value in [0, n), 0 when n <= 1
            Random = 24, "RANDOM", random => [], Arithmetic,
            // =========================
            // Program memory
            // =========================
            /// PEEK ; pop a ; push program[a]
            Peek = 9, "PEEK", peek => [], Memory,
            /// POKE ; pop a, v ; program[a] = v
            Poke = 10, "POKE", poke => [], Memory,
            // =========================
            // Primes and chunks
            // =========================
            /// FACTORIZE ; pop c ; push count, then (exponent, index) for each logical factor, last first
            Factorize = 11, "FACTORIZE", factorize => [], Prime,
            /// BUILD ; pop count, then count (index, exponent) pairs ; push the checksummed chunk
            Build = 12, "BUILD", build => [], Prime,
            /// GET_PRIME ; pop k ; push prime(k)
            GetPrime = 13, "GET_PRIME", get_prime => [], Prime,
            /// GET_PRIME_IDX ; pop p ; push the index of prime p
            GetPrimeIdx = 14, "GET_PRIME_IDX", get_prime_idx => [], Prime,
            // =========================
            // Control flow
            // =========================
            /// NOP ; no effect
            Nop = 15, "NOP", nop => [], Control,
            /// JUMP ; pop t ; ip = t
            Jump = 17, "JUMP", jump => [], Control,
            /// JUMP_IF_ZERO ; pop c, t ; ip = t when c == 0
            JumpIfZero = 18, "JUMP_IF_ZERO", jump_if_zero => [], Control,
            /// HALT ; stop the machine
            Halt = 19, "HALT", halt => [], Control,
            /// CALL ; pop t ; push ip ; ip = t
            Call = 20, "CALL", call => [], Control,
            /// RETURN ; pop r ; ip = r
            Return = 21, "RETURN", ret => [], Control,
            // =========================
            // I/O
            // =========================
            /// PRINT ; pop v ; emit v in decimal
            Print = 2, "PRINT", print => [], Io,
            /// INPUT ; suspend until the caller supplies a value ; push it
            Input = 23, "INPUT", input => [], Io,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (@has_operand []) => { false };
    (@has_operand [ $operand:ident ]) => { true };

    (
        $(
            $(#[$doc:meta])*
            $name:ident = $index:literal, $mnemonic:literal, $ctor:ident => [ $( $operand:ident )? ], $category:ident
        ),* $(,)?
    ) => {
        /// VM opcode, discriminant = prime index.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $index,
            )*
        }

        impl Opcode {
            /// All opcodes in table order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Prime index of the opcode prime.
            pub const fn prime_index(self) -> usize {
                self as usize
            }

            /// Looks up the opcode whose prime has the given index.
            pub const fn from_prime_index(index: usize) -> Option<Self> {
                match index {
                    $( $index => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            /// Assembly mnemonic.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Looks up an opcode by its (case-sensitive) mnemonic.
            pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
                match mnemonic {
                    $( $mnemonic => Some(Opcode::$name), )*
                    _ => None,
                }
            }

            /// Whether the chunk carries an operand factor.
            pub const fn has_operand(self) -> bool {
                match self {
                    $( Opcode::$name => $crate::define_opcodes!(@has_operand [ $( $operand )? ]), )*
                }
            }

            /// Profiling bucket the dispatch is counted under.
            pub const fn category(self) -> DispatchCategory {
                match self {
                    $( Opcode::$name => DispatchCategory::$category, )*
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_indices_are_not_opcodes() {
        for index in [3, 4, 5, 25, 1000] {
            assert_eq!(Opcode::from_prime_index(index), None);
        }
    }

    #[test]
    fn table_is_consistent() {
        assert_eq!(Opcode::ALL.len(), 22);
        for &op in Opcode::ALL {
            assert_eq!(Opcode::from_prime_index(op.prime_index()), Some(op));
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
    }

    #[test]
    fn only_push_has_operand() {
        let with_operand: Vec<Opcode> = Opcode::ALL
            .iter()
            .copied()
            .filter(|op| op.has_operand())
            .collect();
        assert_eq!(with_operand, vec![Opcode::Push]);
    }

    #[test]
    fn region_tags_do_not_collide_with_opcodes() {
        for kind in RegionKind::ALL {
            assert_eq!(Opcode::from_prime_index(kind.tag_index()), None);
        }
    }
}
