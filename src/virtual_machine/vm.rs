//! Interpreter core.
//!
//! [`Machine`] is a resumable state machine. Each [`Machine::step`] fetches,
//! verifies, decodes and dispatches exactly one chunk and reports a
//! [`StepRecord`]. INPUT is the only suspension point: it leaves the machine
//! in [`MachineState::AwaitingInput`] until [`Machine::resume_with_input`]
//! delivers a value.
//!
//! Block and spectral regions are executed as nested frames over the same
//! program memory and operand stack. A frame is an index window, never a copy,
//! so a POKE inside a region is immediately visible outside it. Control and
//! memory targets are relative to the innermost frame.
//!
//! A dispatch either commits its whole effect or none of it: handlers validate
//! every operand before touching the stack or memory, and a faulting dispatch
//! restores the instruction pointer.

pub mod budget;
mod context;
mod stack;
#[cfg(test)]
mod tests;

pub use context::{DataCellPolicy, MachineConfig};

use crate::primes::Factor;
use crate::primes::oracle::{OracleError, PrimeOracle};
use crate::primes::spectral::{self, RoundTrip};
use crate::trace;
use crate::virtual_machine::codec;
use crate::virtual_machine::decode::{ChecksumPolicy, DecodeError, Decoded, decode, logical_factors};
use crate::virtual_machine::entropy::{Entropy, OsEntropy};
use crate::virtual_machine::errors::{SessionError, VmError};
use crate::virtual_machine::isa::{FALSE_INDEX, Opcode, RegionKind, TRUE_INDEX};
use crate::virtual_machine::operand::{OperandRole, Word, parse_word, to_u32, to_u64, to_usize};
use crate::virtual_machine::program::ProgramMemory;
use crate::virtual_machine::state::{MachineState, RunSummary, StepRecord};
use crate::warn;
use budget::{DispatchCategory, DispatchProfile};
use context::{Frame, FrameKind};
use num_traits::Zero;
use stack::OperandStack;

/// What a successful dispatch asks the step loop to do next.
#[derive(Debug, PartialEq, Eq)]
enum Effect {
    Continue,
    Output(String),
    Halt,
    AwaitInput,
    /// A region header opened a frame. Headers produce no record.
    Enter,
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        opcode = $opcode:ident,
        operand = $operand:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $opcode {
            $(
                Opcode::$variant => {
                    let instr_name = $opcode.mnemonic();
                    exec_vm!(@call $vm, $operand, instr_name, $handler, $args)
                }
            ),*
        }
    }};

    // Handler reading the decoded operand
    (@call $vm:ident, $operand:ident, $instr_name:expr, $handler:ident, (operand)) => {{
        $vm.$handler($instr_name, $operand)
    }};

    // Handler working on the stack alone
    (@call $vm:ident, $operand:ident, $instr_name:expr, $handler:ident, ()) => {{
        $vm.$handler($instr_name)
    }};
}

/// Chunk interpreter.
///
/// Owns everything a run mutates: the prime oracle, program memory, the operand
/// stack and the frame stack. Give each session its own machine.
pub struct Machine {
    oracle: PrimeOracle,
    program: ProgramMemory,
    stack: OperandStack,
    /// Innermost frame last. `frames[0]` spans the whole program.
    frames: Vec<Frame>,
    state: MachineState,
    config: MachineConfig,
    entropy: Box<dyn Entropy>,
    profile: DispatchProfile,
    dispatches: u64,
    last_error: Option<VmError>,
    /// Absolute address of the INPUT waiting for a value.
    pending_input: Option<usize>,
}

impl Machine {
    /// Creates a machine with the default configuration.
    pub fn new(program: ProgramMemory) -> Self {
        Self::with_config(program, MachineConfig::default())
    }

    pub fn with_config(program: ProgramMemory, config: MachineConfig) -> Self {
        Self {
            oracle: PrimeOracle::with_limit(config.prime_limit),
            frames: vec![Frame::program(program.len())],
            program,
            stack: OperandStack::default(),
            state: MachineState::Running,
            config,
            entropy: Box::new(OsEntropy),
            profile: DispatchProfile::new(),
            dispatches: 0,
            last_error: None,
            pending_input: None,
        }
    }

    /// Replaces the randomness source used by RANDOM.
    pub fn with_entropy(mut self, entropy: Box<dyn Entropy>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Seeds the operand stack before the first step (bottom first).
    pub fn with_stack(mut self, values: Vec<Word>) -> Self {
        self.stack = OperandStack::new(values);
        self
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn stack(&self) -> &[Word] {
        self.stack.as_slice()
    }

    pub fn peek_program(&self) -> &[Word] {
        self.program.as_slice()
    }

    /// Overwrites one program slot. Allowed before and during a run.
    pub fn patch_program(&mut self, address: usize, chunk: Word) -> Result<(), SessionError> {
        let len = self.program.len();
        self.program
            .set(address, chunk)
            .map(|_| ())
            .ok_or(SessionError::PatchOutOfBounds { address, len })
    }

    /// The oracle this machine decodes with, for building chunks to patch in.
    pub fn oracle_mut(&mut self) -> &mut PrimeOracle {
        &mut self.oracle
    }

    pub fn profile(&self) -> &DispatchProfile {
        &self.profile
    }

    /// Dispatches performed so far, region headers included.
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    pub fn last_error(&self) -> Option<&VmError> {
        self.last_error.as_ref()
    }

    /// Advances by one dispatch.
    pub fn step(&mut self) -> Result<StepRecord, SessionError> {
        match self.state {
            MachineState::Running => Ok(self.advance()),
            MachineState::AwaitingInput => Err(SessionError::AwaitingInput),
            MachineState::Halted | MachineState::Errored => Err(SessionError::Finished {
                state: self.state.as_str(),
            }),
        }
    }

    /// Completes the pending INPUT by pushing `value` (prime index 0 when `None`).
    pub fn resume_with_input(&mut self, value: Option<Word>) -> Result<StepRecord, SessionError> {
        self.ensure_awaiting()?;
        let value = value.unwrap_or_default();
        trace!("INPUT <- {value}");
        self.stack.push(value);
        self.state = MachineState::Running;
        self.pending_input = None;
        Ok(self.record(None))
    }

    /// Like [`resume_with_input`](Self::resume_with_input), parsing a decimal token.
    ///
    /// A blank token supplies the default. Anything else that is not a decimal
    /// integer ends the run with an input type fault.
    pub fn resume_with_text(&mut self, text: &str) -> Result<StepRecord, SessionError> {
        self.ensure_awaiting()?;
        let token = text.trim();
        if token.is_empty() {
            return self.resume_with_input(None);
        }
        match parse_word(token) {
            Some(value) => self.resume_with_input(Some(value)),
            None => {
                let address = self.pending_input.unwrap_or_else(|| self.next_address());
                self.pending_input = None;
                Ok(self.fault(
                    address,
                    VmError::InputType {
                        input: token.to_string(),
                    },
                ))
            }
        }
    }

    /// Steps until the machine halts or faults, answering INPUT from `inputs`
    /// and then with the default value.
    pub fn run(&mut self, inputs: impl IntoIterator<Item = Word>) -> RunSummary {
        let mut inputs = inputs.into_iter();
        let mut summary = RunSummary::default();
        loop {
            let step = match self.state {
                MachineState::Running => self.step(),
                MachineState::AwaitingInput => self.resume_with_input(inputs.next()),
                MachineState::Halted | MachineState::Errored => break,
            };
            let Ok(record) = step else { break };
            summary.steps += 1;
            summary.outputs.extend(record.output);
        }
        summary.error = self.last_error.clone();
        summary
    }

    fn ensure_awaiting(&self) -> Result<(), SessionError> {
        match self.state {
            MachineState::AwaitingInput => Ok(()),
            MachineState::Running => Err(SessionError::NotAwaitingInput),
            MachineState::Halted | MachineState::Errored => Err(SessionError::Finished {
                state: self.state.as_str(),
            }),
        }
    }

    /// Runs dispatches until one produces a record.
    fn advance(&mut self) -> StepRecord {
        loop {
            let frame = self.frame();
            if frame.finished() {
                if self.frames.len() > 1 {
                    trace!("{:>5}  end of {:?}", frame.address(), frame.kind);
                    self.frames.pop();
                    continue;
                }
                self.state = MachineState::Halted;
                return self.record(None);
            }

            let address = frame.address();
            if self.dispatches >= self.config.instruction_budget {
                return self.fault(
                    address,
                    VmError::RunawayExecution {
                        budget: self.config.instruction_budget,
                    },
                );
            }
            self.dispatches += 1;
            self.set_ip(frame.ip + 1);

            match self.dispatch(address) {
                Ok(Effect::Enter) => continue,
                Ok(Effect::Continue) => return self.record(None),
                Ok(Effect::Output(token)) => return self.record(Some(token)),
                Ok(Effect::Halt) => {
                    self.state = MachineState::Halted;
                    return self.record(None);
                }
                Ok(Effect::AwaitInput) => {
                    self.state = MachineState::AwaitingInput;
                    self.pending_input = Some(address);
                    return self.record(None);
                }
                Err(err) => {
                    self.set_ip(frame.ip);
                    return self.fault(address, err);
                }
            }
        }
    }

    /// Fetches, verifies and executes the chunk at `address`.
    fn dispatch(&mut self, address: usize) -> Result<Effect, VmError> {
        let chunk = self.program.get(address).cloned().ok_or(VmError::OutOfBounds {
            instruction: "FETCH",
            target: Word::from(address),
            limit: self.program.len(),
        })?;
        let decoded = decode(&mut self.oracle, &chunk, ChecksumPolicy::Strict)
            .map_err(|source| VmError::Chunk { address, source })?;

        match decoded {
            Decoded::Inert => {
                trace!("{address:>5}  (inert)");
                self.profile.record(DispatchCategory::Control);
                Ok(Effect::Continue)
            }
            Decoded::Region { kind, length } => self.enter_region(kind, length),
            Decoded::Data { position, payload } => self.data_cell(address, position, payload),
            Decoded::Instruction { opcode, operand } => {
                trace!(
                    "{address:>5}  {}{} (stack depth {})",
                    opcode.mnemonic(),
                    operand.map(|k| format!(" {k}")).unwrap_or_default(),
                    self.stack.len()
                );
                self.profile.record(opcode.category());
                self.exec(opcode, operand)
            }
        }
    }

    fn exec(&mut self, opcode: Opcode, operand: Option<usize>) -> Result<Effect, VmError> {
        exec_vm! {
            vm = self,
            opcode = opcode,
            operand = operand,
            {
                // Stack
                Push => op_push(operand),
                Dup => op_dup(),
                Swap => op_swap(),
                Drop => op_drop(),
                // Arithmetic
                Add => op_add(),
                CompareEq => op_compare_eq(),
                Mod => op_mod(),
                Random => op_random(),
                // Program memory
                Peek => op_peek(),
                Poke => op_poke(),
                // Primes and chunks
                Factorize => op_factorize(),
                Build => op_build(),
                GetPrime => op_get_prime(),
                GetPrimeIdx => op_get_prime_idx(),
                // Control flow
                Nop => op_nop(),
                Jump => op_jump(),
                JumpIfZero => op_jump_if_zero(),
                Halt => op_halt(),
                Call => op_call(),
                Return => op_return(),
                // I/O
                Print => op_print(),
                Input => op_input(),
            }
        }
    }

    /// Opens a frame over the `length` chunks after the header, clamped to the
    /// enclosing frame, and moves the enclosing frame past them.
    fn enter_region(&mut self, kind: RegionKind, length: usize) -> Result<Effect, VmError> {
        let parent = self.frame();
        let length = length.min(parent.len - parent.ip);
        let base = parent.address();

        trace!("{:>5}  {} {length}", base - 1, kind.keyword());
        self.profile.record(DispatchCategory::Region);
        if kind == RegionKind::Spectral {
            self.spectral_check(base, length);
        }

        self.set_ip(parent.ip + length);
        self.frames.push(Frame {
            base,
            len: length,
            ip: 0,
            kind: FrameKind::Region(kind),
        });
        Ok(Effect::Enter)
    }

    /// Runs the region's payloads through the transform pair and reports drift.
    /// The outcome never affects execution.
    fn spectral_check(&mut self, base: usize, length: usize) {
        let mut payloads = Vec::with_capacity(length);
        for chunk in &self.program.as_slice()[base..base + length] {
            let payload = logical_factors(&mut self.oracle, chunk, ChecksumPolicy::Lenient)
                .ok()
                .and_then(|factors| factors.first().map(|f| u64::from(f.exponent)))
                .unwrap_or(0);
            payloads.push(payload);
        }

        match spectral::round_trip(&payloads) {
            Ok(RoundTrip::Exact) => trace!("spectral region at {base}: round trip exact"),
            Ok(RoundTrip::Mismatch { expected, actual }) => {
                warn!("spectral region at {base}: payloads {expected:?} came back as {actual:?}")
            }
            Err(err) => warn!("spectral region at {base}: {err}"),
        }
    }

    fn data_cell(&mut self, address: usize, position: usize, payload: usize) -> Result<Effect, VmError> {
        match self.config.data_cells {
            DataCellPolicy::Reject => Err(VmError::Chunk {
                address,
                source: DecodeError::DataCell { position, payload },
            }),
            DataCellPolicy::Emit => {
                let ch = u32::try_from(payload)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(VmError::InvalidCharacter { payload })?;
                trace!("{address:>5}  DATA {position} {payload}");
                self.profile.record(DispatchCategory::Io);
                Ok(Effect::Output(ch.to_string()))
            }
        }
    }

    // ==================== Stack ====================

    fn op_push(&mut self, _instr: &'static str, operand: Option<usize>) -> Result<Effect, VmError> {
        self.stack.push(Word::from(operand.unwrap_or_default()));
        Ok(Effect::Continue)
    }

    fn op_dup(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let top = self.stack.peek(instr, 0)?.clone();
        self.stack.push(top);
        Ok(Effect::Continue)
    }

    fn op_swap(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        self.stack.swap_top(instr)?;
        Ok(Effect::Continue)
    }

    fn op_drop(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        self.stack.pop(instr)?;
        Ok(Effect::Continue)
    }

    // ==================== Arithmetic ====================

    fn op_add(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        self.stack.require(instr, 2)?;
        let b = self.stack.pop(instr)?;
        let a = self.stack.pop(instr)?;
        self.stack.push(a + b);
        Ok(Effect::Continue)
    }

    fn op_compare_eq(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        self.stack.require(instr, 2)?;
        let b = self.stack.pop(instr)?;
        let a = self.stack.pop(instr)?;
        let result = if a == b { TRUE_INDEX } else { FALSE_INDEX };
        self.stack.push(Word::from(result));
        Ok(Effect::Continue)
    }

    fn op_mod(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        self.stack.require(instr, 2)?;
        if self.stack.peek(instr, 0)?.is_zero() {
            return Err(VmError::ModuloByZero);
        }
        let modulus = self.stack.pop(instr)?;
        let value = self.stack.pop(instr)?;
        self.stack.push(value % modulus);
        Ok(Effect::Continue)
    }

    fn op_random(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let bound = to_u64(instr, OperandRole::Bound, self.stack.peek(instr, 0)?)?;
        let value = if bound <= 1 { 0 } else { self.entropy.below(bound) };
        self.stack.pop(instr)?;
        self.stack.push(Word::from(value));
        Ok(Effect::Continue)
    }

    // ==================== Program memory ====================

    fn op_peek(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let address = self.memory_target(instr, self.stack.peek(instr, 0)?)?;
        let chunk = self.program.get(address).cloned().unwrap_or_default();
        self.stack.pop(instr)?;
        self.stack.push(chunk);
        Ok(Effect::Continue)
    }

    fn op_poke(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        self.stack.require(instr, 2)?;
        let address = self.memory_target(instr, self.stack.peek(instr, 0)?)?;
        let value = self.stack.peek(instr, 1)?.clone();
        self.stack.discard(instr, 2)?;
        self.program.set(address, value);
        Ok(Effect::Continue)
    }

    // ==================== Primes and chunks ====================

    fn op_factorize(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let chunk = self.stack.peek(instr, 0)?;
        let factors = logical_factors(&mut self.oracle, chunk, ChecksumPolicy::Lenient)
            .map_err(|source| VmError::Operand {
                instruction: instr,
                source,
            })?;
        self.stack.pop(instr)?;
        self.stack.push(Word::from(factors.len()));
        for f in factors.iter().rev() {
            self.stack.push(Word::from(f.exponent));
            self.stack.push(Word::from(f.index));
        }
        Ok(Effect::Continue)
    }

    fn op_build(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let count_word = self.stack.peek(instr, 0)?;
        let count = to_usize(instr, OperandRole::Count, count_word)?;
        let depth = count
            .checked_mul(2)
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| VmError::OperandRange {
                instruction: instr,
                role: OperandRole::Count.as_str(),
                value: count_word.clone(),
            })?;
        self.stack.require(instr, depth)?;

        // Pairs are read top-down: index above exponent.
        let mut factors = Vec::with_capacity(count);
        for pair in 0..count {
            let index = to_usize(instr, OperandRole::PrimeIndex, self.stack.peek(instr, 1 + 2 * pair)?)?;
            let exponent = to_u32(instr, OperandRole::Exponent, self.stack.peek(instr, 2 + 2 * pair)?)?;
            if exponent > 0 {
                factors.push(Factor::new(index, exponent));
            }
        }
        let chunk = codec::encode(&mut self.oracle, &factors).map_err(|source| VmError::Build { source })?;

        self.stack.discard(instr, depth)?;
        self.stack.push(chunk);
        Ok(Effect::Continue)
    }

    fn op_get_prime(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let index = to_usize(instr, OperandRole::PrimeIndex, self.stack.peek(instr, 0)?)?;
        let prime = self.oracle.prime_at(index)?;
        self.stack.pop(instr)?;
        self.stack.push(Word::from(prime));
        Ok(Effect::Continue)
    }

    fn op_get_prime_idx(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let word = self.stack.peek(instr, 0)?;
        let not_a_prime = || VmError::NotAPrime { value: word.clone() };
        let value = to_u64(instr, OperandRole::PrimeIndex, word).map_err(|_| not_a_prime())?;
        let index = self.oracle.resolve_index(value).map_err(|err| match err {
            OracleError::UnknownPrime { .. } => not_a_prime(),
            other => VmError::Oracle(other),
        })?;
        self.stack.pop(instr)?;
        self.stack.push(Word::from(index));
        Ok(Effect::Continue)
    }

    // ==================== Control flow ====================

    fn op_nop(&mut self, _instr: &'static str) -> Result<Effect, VmError> {
        Ok(Effect::Continue)
    }

    fn op_jump(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let target = self.control_target(instr, self.stack.peek(instr, 0)?)?;
        self.stack.pop(instr)?;
        self.set_ip(target);
        Ok(Effect::Continue)
    }

    fn op_jump_if_zero(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        self.stack.require(instr, 2)?;
        let taken = self.stack.peek(instr, 0)? == &Word::from(FALSE_INDEX);
        let target = self.control_target(instr, self.stack.peek(instr, 1)?)?;
        self.stack.discard(instr, 2)?;
        if taken {
            self.set_ip(target);
        }
        Ok(Effect::Continue)
    }

    fn op_halt(&mut self, _instr: &'static str) -> Result<Effect, VmError> {
        Ok(Effect::Halt)
    }

    fn op_call(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let target = self.control_target(instr, self.stack.peek(instr, 0)?)?;
        let return_address = self.frame().ip;
        self.stack.pop(instr)?;
        self.stack.push(Word::from(return_address));
        self.set_ip(target);
        Ok(Effect::Continue)
    }

    fn op_return(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let target = self.control_target(instr, self.stack.peek(instr, 0)?)?;
        self.stack.pop(instr)?;
        self.set_ip(target);
        Ok(Effect::Continue)
    }

    // ==================== I/O ====================

    fn op_print(&mut self, instr: &'static str) -> Result<Effect, VmError> {
        let value = self.stack.pop(instr)?;
        Ok(Effect::Output(value.to_string()))
    }

    fn op_input(&mut self, _instr: &'static str) -> Result<Effect, VmError> {
        Ok(Effect::AwaitInput)
    }

    // ==================== Helpers ====================

    fn frame(&self) -> Frame {
        self.frames
            .last()
            .copied()
            .unwrap_or_else(|| Frame::program(self.program.len()))
    }

    fn set_ip(&mut self, ip: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = ip;
        }
    }

    fn next_address(&self) -> usize {
        self.frame().address()
    }

    /// Resolves a frame-relative jump target in `[0, len]` (`len` finishes the frame).
    fn control_target(&self, instr: &'static str, word: &Word) -> Result<usize, VmError> {
        let frame = self.frame();
        match to_usize(instr, OperandRole::Address, word)? {
            target if target <= frame.len => Ok(target),
            _ => Err(VmError::OutOfBounds {
                instruction: instr,
                target: word.clone(),
                limit: frame.len + 1,
            }),
        }
    }

    /// Resolves a frame-relative memory target in `[0, len)` to an absolute address.
    fn memory_target(&self, instr: &'static str, word: &Word) -> Result<usize, VmError> {
        let frame = self.frame();
        match to_usize(instr, OperandRole::Address, word)? {
            target if target < frame.len => Ok(frame.base + target),
            _ => Err(VmError::OutOfBounds {
                instruction: instr,
                target: word.clone(),
                limit: frame.len,
            }),
        }
    }

    fn record(&self, output: Option<String>) -> StepRecord {
        StepRecord {
            instruction_pointer: self.next_address(),
            stack: self.stack.snapshot(),
            program: self.program.as_slice().to_vec(),
            output,
            halted: self.state.is_terminal(),
            error: None,
            needs_input: self.state == MachineState::AwaitingInput,
        }
    }

    /// Ends the run with `err`, reported at the faulting `address`.
    fn fault(&mut self, address: usize, err: VmError) -> StepRecord {
        trace!("{address:>5}  fault: {err}");
        self.state = MachineState::Errored;
        let message = format!("{}: {err}", err.kind());
        self.last_error = Some(err);
        StepRecord {
            instruction_pointer: address,
            stack: self.stack.snapshot(),
            program: self.program.as_slice().to_vec(),
            output: None,
            halted: true,
            error: Some(message),
            needs_input: false,
        }
    }
}
