use crate::primes::oracle::DEFAULT_PRIME_LIMIT;
use crate::virtual_machine::isa::RegionKind;
use crate::virtual_machine::vm::budget::DEFAULT_INSTRUCTION_BUDGET;

/// How the interpreter treats a data cell met during fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataCellPolicy {
    /// A data cell is a decode fault.
    #[default]
    Reject,
    /// A data cell emits the character whose code point is its payload index.
    Emit,
}

/// Run configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    /// Dispatches allowed before the run fails with `RunawayExecution`.
    pub instruction_budget: u64,
    pub data_cells: DataCellPolicy,
    /// Maximum number of primes the machine's oracle may cache.
    pub prime_limit: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            instruction_budget: DEFAULT_INSTRUCTION_BUDGET,
            data_cells: DataCellPolicy::Reject,
            prime_limit: DEFAULT_PRIME_LIMIT,
        }
    }
}

/// What opened an execution frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum FrameKind {
    Program,
    Region(RegionKind),
}

/// A window of program memory being executed.
///
/// `ip` is relative to `base`; `ip == len` means the frame is finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Frame {
    pub(super) base: usize,
    pub(super) len: usize,
    pub(super) ip: usize,
    pub(super) kind: FrameKind,
}

impl Frame {
    pub(super) fn program(len: usize) -> Self {
        Self {
            base: 0,
            len,
            ip: 0,
            kind: FrameKind::Program,
        }
    }

    /// Absolute address of the next chunk.
    pub(super) fn address(&self) -> usize {
        self.base + self.ip
    }

    pub(super) fn finished(&self) -> bool {
        self.ip >= self.len
    }
}
