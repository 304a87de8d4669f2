use crate::primes::oracle::OracleError;
use crate::virtual_machine::codec::CodecError;
use crate::virtual_machine::decode::DecodeError;
use crate::virtual_machine::operand::Word;
use chunkvm_derive::Error;
use std::fmt::Display;

/// Coarse classification of run faults.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FaultKind {
    /// Bad or missing checksum, raw zero chunk, unfactorable chunk.
    Integrity,
    /// Ambiguous or missing opcode factor, malformed chunk layout.
    Decode,
    StackUnderflow,
    /// Instruction or memory target outside the current frame.
    Bounds,
    /// Modulo by index 0, out-of-range operands, non-prime lookups.
    Arithmetic,
    UnknownOpcode,
    RunawayExecution,
    InputType,
}

impl FaultKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Integrity => "IntegrityError",
            FaultKind::Decode => "DecodeError",
            FaultKind::StackUnderflow => "StackUnderflow",
            FaultKind::Bounds => "BoundsError",
            FaultKind::Arithmetic => "ArithmeticError",
            FaultKind::UnknownOpcode => "UnknownOpcode",
            FaultKind::RunawayExecution => "RunawayExecution",
            FaultKind::InputType => "InputTypeError",
        }
    }
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Faults that end a run. The machine moves to `Errored` on the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// The chunk fetched at `address` could not be decoded.
    #[error("chunk at address {address}: {source}")]
    Chunk { address: usize, source: DecodeError },
    /// A chunk popped from the stack by FACTORIZE could not be decoded.
    #[error("{instruction} operand: {source}")]
    Operand {
        instruction: &'static str,
        source: DecodeError,
    },
    #[error("{instruction} needs {required} stack values but {available} are present")]
    StackUnderflow {
        instruction: &'static str,
        required: usize,
        available: usize,
    },
    /// `limit` is the exclusive upper bound of valid targets.
    #[error("{instruction} target {target} is outside 0..{limit}")]
    OutOfBounds {
        instruction: &'static str,
        target: Word,
        limit: usize,
    },
    #[error("{instruction} {role} {value} is out of range")]
    OperandRange {
        instruction: &'static str,
        role: &'static str,
        value: Word,
    },
    #[error("MOD by prime index 0")]
    ModuloByZero,
    #[error("GET_PRIME_IDX: {value} is not a prime")]
    NotAPrime { value: Word },
    #[error("BUILD: {source}")]
    Build { source: CodecError },
    #[error("data cell payload {payload} is not a character")]
    InvalidCharacter { payload: usize },
    #[error("instruction budget of {budget} dispatches exhausted")]
    RunawayExecution { budget: u64 },
    #[error("input {input:?} is not a non-negative integer")]
    InputType { input: String },
    #[error("prime oracle: {0}")]
    Oracle(#[from] OracleError),
}

impl VmError {
    pub fn kind(&self) -> FaultKind {
        match self {
            VmError::Chunk { source, .. } | VmError::Operand { source, .. } => source.kind(),
            VmError::StackUnderflow { .. } => FaultKind::StackUnderflow,
            VmError::OutOfBounds { .. } => FaultKind::Bounds,
            VmError::OperandRange { .. }
            | VmError::ModuloByZero
            | VmError::NotAPrime { .. }
            | VmError::Build { .. }
            | VmError::Oracle(_) => FaultKind::Arithmetic,
            VmError::InvalidCharacter { .. } => FaultKind::Decode,
            VmError::RunawayExecution { .. } => FaultKind::RunawayExecution,
            VmError::InputType { .. } => FaultKind::InputType,
        }
    }
}

/// Misuse of the stepping protocol. The machine is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("the machine is waiting for input; resume it instead of stepping")]
    AwaitingInput,
    #[error("the machine is not waiting for input")]
    NotAwaitingInput,
    #[error("the machine has already {state}")]
    Finished { state: &'static str },
    #[error("address {address} is outside program memory of {len} chunks")]
    PatchOutOfBounds { address: usize, len: usize },
}

/// Errors from loading program text or assembling source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("line {line}: {token:?} is not a non-negative integer")]
    InvalidLine { line: usize, token: String },
    /// Assembly error with line and column context.
    #[error("line {line}, column {column}: {message}")]
    Assembly {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("{path}: {message}")]
    Io { path: String, message: String },
}
