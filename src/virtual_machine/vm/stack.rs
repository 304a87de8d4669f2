use crate::virtual_machine::errors::VmError;
use crate::virtual_machine::operand::Word;

/// The operand stack shared by every frame of a run.
///
/// Handlers call [`require`](Self::require) before popping so that a failing
/// instruction leaves the stack as it found it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct OperandStack {
    values: Vec<Word>,
}

impl OperandStack {
    pub(super) fn new(values: Vec<Word>) -> Self {
        Self { values }
    }

    pub(super) fn len(&self) -> usize {
        self.values.len()
    }

    /// Fails with `StackUnderflow` unless at least `required` values are present.
    pub(super) fn require(&self, instr: &'static str, required: usize) -> Result<(), VmError> {
        if self.values.len() < required {
            return Err(VmError::StackUnderflow {
                instruction: instr,
                required,
                available: self.values.len(),
            });
        }
        Ok(())
    }

    /// Returns the value `depth` slots below the top (0 = top).
    pub(super) fn peek(&self, instr: &'static str, depth: usize) -> Result<&Word, VmError> {
        self.require(instr, depth + 1)?;
        Ok(&self.values[self.values.len() - 1 - depth])
    }

    pub(super) fn pop(&mut self, instr: &'static str) -> Result<Word, VmError> {
        self.require(instr, 1)?;
        Ok(self.values.pop().unwrap_or_default())
    }

    /// Removes the top `count` values.
    pub(super) fn discard(&mut self, instr: &'static str, count: usize) -> Result<(), VmError> {
        self.require(instr, count)?;
        self.values.truncate(self.values.len() - count);
        Ok(())
    }

    pub(super) fn push(&mut self, value: Word) {
        self.values.push(value);
    }

    pub(super) fn swap_top(&mut self, instr: &'static str) -> Result<(), VmError> {
        self.require(instr, 2)?;
        let len = self.values.len();
        self.values.swap(len - 1, len - 2);
        Ok(())
    }

    pub(super) fn as_slice(&self) -> &[Word] {
        &self.values
    }

    pub(super) fn snapshot(&self) -> Vec<Word> {
        self.values.clone()
    }
}
