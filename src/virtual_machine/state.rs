//! Machine lifecycle and the per-step record handed to collaborators.
//!
//! A machine starts [`MachineState::Running`], may bounce between `Running` and
//! [`MachineState::AwaitingInput`] any number of times, and ends in exactly one
//! of the terminal states `Halted` or `Errored`.

use crate::virtual_machine::errors::VmError;
use crate::virtual_machine::operand::Word;
use std::fmt::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MachineState {
    Running,
    /// An INPUT dispatch is pending; only a resume call may continue.
    AwaitingInput,
    Halted,
    Errored,
}

impl MachineState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MachineState::Running => "running",
            MachineState::AwaitingInput => "awaiting input",
            MachineState::Halted => "halted",
            MachineState::Errored => "errored",
        }
    }

    /// Whether no further steps will be produced.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, MachineState::Halted | MachineState::Errored)
    }
}

impl Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable result of one dispatch.
///
/// `halted` is set on every terminal record, so a fault record carries both
/// `halted` and `error`. `instruction_pointer` is an absolute program address:
/// the next chunk to fetch, or the faulting chunk on an error record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    pub instruction_pointer: usize,
    pub stack: Vec<Word>,
    pub program: Vec<Word>,
    pub output: Option<String>,
    pub halted: bool,
    pub error: Option<String>,
    pub needs_input: bool,
}

impl StepRecord {
    /// Whether this record ends the run.
    pub fn is_final(&self) -> bool {
        self.halted || self.error.is_some()
    }
}

/// What a run-to-completion produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Output tokens in emission order.
    pub outputs: Vec<String>,
    /// Step records produced, resumes included.
    pub steps: usize,
    /// The fault that ended the run, if it did not halt cleanly.
    pub error: Option<VmError>,
}
