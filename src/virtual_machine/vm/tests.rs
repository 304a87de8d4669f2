use super::*;
use super::budget::DEFAULT_INSTRUCTION_BUDGET;
use crate::virtual_machine::assembler::assemble_source;
use crate::virtual_machine::entropy::tests::ScriptedEntropy;
use crate::virtual_machine::errors::FaultKind;

fn machine(source: &str) -> Machine {
    Machine::new(assemble_source(source).expect("assembly failed"))
}

fn machine_with(source: &str, config: MachineConfig) -> Machine {
    Machine::with_config(assemble_source(source).expect("assembly failed"), config)
}

fn run_program(source: &str) -> RunSummary {
    machine(source).run([])
}

fn run_outputs(source: &str) -> Vec<String> {
    let summary = run_program(source);
    assert_eq!(summary.error, None, "unexpected fault");
    summary.outputs
}

fn run_expect_fault(source: &str) -> VmError {
    run_program(source).error.expect("expected a fault")
}

fn words(values: &[u64]) -> Vec<Word> {
    values.iter().map(|&v| Word::from(v)).collect()
}

fn budget(instruction_budget: u64) -> MachineConfig {
    MachineConfig {
        instruction_budget,
        ..MachineConfig::default()
    }
}

// ==================== Stack ====================

#[test]
fn push_add_print() {
    let mut vm = machine("PUSH 8\nPUSH 9\nADD\nPRINT\nHALT");
    let summary = vm.run([]);
    assert_eq!(summary.outputs, vec!["17"]);
    assert_eq!(summary.error, None);
    assert_eq!(vm.state(), MachineState::Halted);
    assert!(vm.stack().is_empty());
}

#[test]
fn swap_dup_drop() {
    let source = "PUSH 1\nPUSH 2\nSWAP\nPRINT\nDUP\nPRINT\nPRINT\nPUSH 3\nDROP\nHALT";
    assert_eq!(run_outputs(source), vec!["1", "2", "2"]);
}

#[test]
fn seeded_stack_is_visible() {
    let program = assemble_source("ADD\nPRINT\nHALT").unwrap();
    let mut vm = Machine::new(program).with_stack(words(&[40, 2]));
    assert_eq!(vm.run([]).outputs, vec!["42"]);
}

#[test]
fn underflow_leaves_stack_untouched() {
    let mut vm = machine("PUSH 1\nADD\nHALT");
    vm.step().unwrap();
    let record = vm.step().unwrap();

    assert_eq!(record.instruction_pointer, 1);
    assert!(record.halted);
    assert_eq!(
        record.error.as_deref(),
        Some("StackUnderflow: ADD needs 2 stack values but 1 are present")
    );
    assert_eq!(record.stack, words(&[1]));
    assert_eq!(vm.state(), MachineState::Errored);
    assert_eq!(vm.last_error().map(VmError::kind), Some(FaultKind::StackUnderflow));
}

#[test]
fn every_consumer_checks_depth() {
    for (source, instruction) in [
        ("DUP", "DUP"),
        ("PUSH 1\nSWAP", "SWAP"),
        ("DROP", "DROP"),
        ("PRINT", "PRINT"),
        ("PUSH 1\nMOD", "MOD"),
        ("PUSH 1\nCOMPARE_EQ", "COMPARE_EQ"),
        ("PUSH 0\nPOKE", "POKE"),
        ("JUMP", "JUMP"),
        ("RETURN", "RETURN"),
    ] {
        match run_expect_fault(source) {
            VmError::StackUnderflow { instruction: got, .. } => assert_eq!(got, instruction),
            other => panic!("{source}: unexpected {other:?}"),
        }
    }
}

// ==================== Arithmetic ====================

#[test]
fn compare_eq_yields_true_and_false_indices() {
    let source = "PUSH 4\nPUSH 4\nCOMPARE_EQ\nPRINT\nPUSH 4\nPUSH 5\nCOMPARE_EQ\nPRINT\nHALT";
    assert_eq!(run_outputs(source), vec!["1", "0"]);
}

#[test]
fn modulo() {
    assert_eq!(run_outputs("PUSH 17\nPUSH 5\nMOD\nPRINT\nHALT"), vec!["2"]);
}

#[test]
fn mod_by_zero_is_fatal_and_atomic() {
    let mut vm = machine("PUSH 4\nPUSH 0\nMOD\nHALT");
    let summary = vm.run([]);
    assert_eq!(summary.error, Some(VmError::ModuloByZero));
    assert_eq!(vm.stack(), words(&[4, 0]).as_slice());

    let err = run_expect_fault("PUSH 4\nPUSH 0\nMOD");
    assert_eq!(err.kind(), FaultKind::Arithmetic);
}

#[test]
fn random_stays_below_bound() {
    for _ in 0..50 {
        let out = run_outputs("PUSH 3\nRANDOM\nPRINT\nHALT");
        assert!(["0", "1", "2"].contains(&out[0].as_str()), "{out:?}");
    }
    assert_eq!(run_outputs("PUSH 1\nRANDOM\nPRINT\nHALT"), vec!["0"]);
    assert_eq!(run_outputs("PUSH 0\nRANDOM\nPRINT\nHALT"), vec!["0"]);
}

#[test]
fn random_draws_from_injected_entropy() {
    let program = assemble_source("PUSH 3\nRANDOM\nPRINT\nPUSH 10\nRANDOM\nPRINT\nHALT").unwrap();
    let mut vm = Machine::new(program).with_entropy(Box::new(ScriptedEntropy::new([5, 7])));
    assert_eq!(vm.run([]).outputs, vec!["2", "7"]);
}

#[test]
fn random_bound_beyond_u64_faults() {
    let program = assemble_source("RANDOM\nHALT").unwrap();
    let huge = Word::from(u64::MAX) + Word::from(1u32);
    let mut vm = Machine::new(program).with_stack(vec![huge.clone()]);
    let summary = vm.run([]);
    assert!(matches!(summary.error, Some(VmError::OperandRange { .. })));
    assert_eq!(vm.stack(), &[huge]);
}

// ==================== Control Flow ====================

#[test]
fn jump_skips_to_target() {
    let mut vm = machine("PUSH 3\nJUMP\nNOP\nHALT");
    let summary = vm.run([]);
    assert!(summary.outputs.is_empty());
    assert_eq!(summary.error, None);
    assert_eq!(vm.state(), MachineState::Halted);
    assert_eq!(vm.dispatches(), 3);
}

#[test]
fn jump_to_length_finishes_the_program() {
    let mut vm = machine("PUSH 3\nJUMP\nHALT");
    let summary = vm.run([]);
    assert_eq!(summary.error, None);
    assert_eq!(vm.state(), MachineState::Halted);
}

#[test]
fn jump_past_length_is_a_bounds_fault() {
    let err = run_expect_fault("PUSH 4\nJUMP\nHALT");
    assert_eq!(err.kind(), FaultKind::Bounds);
    assert!(matches!(
        err,
        VmError::OutOfBounds {
            instruction: "JUMP",
            limit: 4,
            ..
        }
    ));
}

#[test]
fn jump_if_zero_taken_and_not_taken() {
    let taken = "PUSH 5\nPUSH 0\nJUMP_IF_ZERO\nPUSH 1\nPRINT\nPUSH 2\nPRINT\nHALT";
    assert_eq!(run_outputs(taken), vec!["2"]);

    let not_taken = "PUSH 5\nPUSH 1\nJUMP_IF_ZERO\nPUSH 1\nPRINT\nPUSH 2\nPRINT\nHALT";
    assert_eq!(run_outputs(not_taken), vec!["1", "2"]);
}

#[test]
fn jump_if_zero_validates_target_even_when_not_taken() {
    let mut vm = machine("PUSH 99\nPUSH 1\nJUMP_IF_ZERO\nHALT");
    let summary = vm.run([]);
    assert_eq!(summary.error.map(|e| e.kind()), Some(FaultKind::Bounds));
    assert_eq!(vm.stack(), words(&[99, 1]).as_slice());
}

#[test]
fn call_and_return() {
    let source = "PUSH 6\nCALL\nPUSH 100\nPRINT\nHALT\nNOP\nPUSH 50\nPRINT\nRETURN";
    assert_eq!(run_outputs(source), vec!["50", "100"]);
}

#[test]
fn call_pushes_address_after_call() {
    let mut vm = machine("PUSH 3\nCALL\nHALT\nHALT");
    vm.step().unwrap();
    let record = vm.step().unwrap();
    assert_eq!(record.stack, words(&[2]));
    assert_eq!(record.instruction_pointer, 3);
}

#[test]
fn halt_stops_before_trailing_code() {
    assert!(run_outputs("HALT\nPUSH 1\nPRINT").is_empty());
}

#[test]
fn falling_off_the_end_halts() {
    let mut vm = machine("PUSH 1\nPRINT");
    vm.step().unwrap();
    vm.step().unwrap();
    let record = vm.step().unwrap();
    assert!(record.halted);
    assert_eq!(record.error, None);
    assert_eq!(record.instruction_pointer, 2);
    assert_eq!(vm.state(), MachineState::Halted);
}

#[test]
fn empty_program_halts_immediately() {
    let mut vm = Machine::new(ProgramMemory::default());
    let record = vm.step().unwrap();
    assert!(record.halted);
    assert_eq!(vm.dispatches(), 0);
}

// ==================== Budget ====================

#[test]
fn runaway_loop_stops_at_budget() {
    let mut vm = machine_with("loop: PUSH loop\nJUMP", budget(10));
    let summary = vm.run([]);
    assert_eq!(summary.error, Some(VmError::RunawayExecution { budget: 10 }));
    assert_eq!(vm.dispatches(), 10);
    assert_eq!(vm.state(), MachineState::Errored);
}

#[test]
fn default_budget_is_one_thousand() {
    let mut vm = machine("loop: PUSH loop\nJUMP");
    let summary = vm.run([]);
    assert_eq!(summary.error.map(|e| e.kind()), Some(FaultKind::RunawayExecution));
    assert_eq!(vm.dispatches(), DEFAULT_INSTRUCTION_BUDGET);
}

#[test]
fn region_headers_count_against_budget() {
    let mut vm = machine_with("BLOCK 1\nNOP\nNOP", budget(2));
    let first = vm.step().unwrap();
    assert_eq!(first.error, None);
    assert_eq!(vm.dispatches(), 2);

    let second = vm.step().unwrap();
    assert_eq!(
        second.error.as_deref(),
        Some("RunawayExecution: instruction budget of 2 dispatches exhausted")
    );
    assert_eq!(second.instruction_pointer, 2);
}

#[test]
fn budget_exactly_sufficient() {
    let mut vm = machine_with("NOP\nNOP\nHALT", budget(3));
    assert_eq!(vm.run([]).error, None);
    assert_eq!(vm.state(), MachineState::Halted);
}

// ==================== Program Memory ====================

#[test]
fn peek_reads_program_chunk() {
    let mut vm = machine("PUSH 0\nPEEK\nPRINT\nHALT");
    let expected = codec::push(vm.oracle_mut(), 0).unwrap();
    assert_eq!(vm.run([]).outputs, vec![expected.to_string()]);
}

#[test]
fn build_poke_then_execute_patched_chunk() {
    // BUILD reads pairs top-down: (index 0, exponent 4), (index 8, exponent 5).
    let source = "\
        PUSH 5\n\
        PUSH 8\n\
        PUSH 4\n\
        PUSH 0\n\
        PUSH 2\n\
        BUILD\n\
        PUSH slot\n\
        POKE\n\
        slot: NOP\n\
        PRINT\n\
        HALT\n";
    let mut vm = machine(source);
    let summary = vm.run([]);
    assert_eq!(summary.outputs, vec!["8"]);

    let expected = codec::push(vm.oracle_mut(), 8).unwrap();
    assert_eq!(vm.peek_program()[8], expected);
    let decoded = decode(vm.oracle_mut(), &expected, ChecksumPolicy::Strict).unwrap();
    assert_eq!(
        decoded,
        Decoded::Instruction {
            opcode: Opcode::Push,
            operand: Some(8)
        }
    );
}

#[test]
fn poke_then_peek_round_trip() {
    // The target slot sits after HALT and is never fetched.
    let mut vm = machine("PUSH 7\nPUSH 7\nPOKE\nPUSH 7\nPEEK\nPRINT\nHALT\nNOP");
    assert_eq!(vm.run([]).outputs, vec!["7"]);
    assert_eq!(vm.peek_program()[7], Word::from(7u32));
}

#[test]
fn poke_out_of_bounds_is_atomic() {
    let mut vm = machine("PUSH 1\nPUSH 9\nPOKE\nHALT");
    let before = vm.peek_program().to_vec();
    let summary = vm.run([]);
    assert_eq!(summary.error.map(|e| e.kind()), Some(FaultKind::Bounds));
    assert_eq!(vm.stack(), words(&[1, 9]).as_slice());
    assert_eq!(vm.peek_program(), before.as_slice());
}

#[test]
fn peek_at_length_is_out_of_bounds() {
    let err = run_expect_fault("PUSH 3\nPEEK\nHALT");
    assert!(matches!(
        err,
        VmError::OutOfBounds {
            instruction: "PEEK",
            limit: 3,
            ..
        }
    ));
}

#[test]
fn patch_program_seeds_first_instruction() {
    let mut vm = machine("NOP\nPRINT\nHALT");
    let chunk = codec::push(vm.oracle_mut(), 42).unwrap();
    vm.patch_program(0, chunk).unwrap();
    assert_eq!(vm.run([]).outputs, vec!["42"]);
}

#[test]
fn patch_program_out_of_range() {
    let mut vm = machine("NOP\nPRINT\nHALT");
    assert_eq!(
        vm.patch_program(3, Word::from(1u32)),
        Err(SessionError::PatchOutOfBounds { address: 3, len: 3 })
    );
}

// ==================== Primes and Chunks ====================

#[test]
fn factorize_pushes_pairs_in_reverse() {
    let program = assemble_source("FACTORIZE\nHALT").unwrap();
    let mut vm = Machine::new(program);
    let chunk = codec::push(vm.oracle_mut(), 8).unwrap();
    let mut vm = vm.with_stack(vec![chunk]);
    assert_eq!(vm.run([]).error, None);
    assert_eq!(vm.stack(), words(&[2, 5, 8, 4, 0]).as_slice());
}

#[test]
fn factorize_keeps_unverified_factors() {
    let program = assemble_source("FACTORIZE\nHALT").unwrap();
    let mut vm = Machine::new(program).with_stack(words(&[81]));
    assert_eq!(vm.run([]).error, None);
    assert_eq!(vm.stack(), words(&[1, 4, 1]).as_slice());
}

#[test]
fn factorize_zero_is_an_integrity_fault() {
    let program = assemble_source("FACTORIZE\nHALT").unwrap();
    let mut vm = Machine::new(program).with_stack(words(&[0]));
    let summary = vm.run([]);
    assert_eq!(
        summary.error,
        Some(VmError::Operand {
            instruction: "FACTORIZE",
            source: DecodeError::Zero
        })
    );
    assert_eq!(summary.error.map(|e| e.kind()), Some(FaultKind::Integrity));
    assert_eq!(vm.stack(), words(&[0]).as_slice());
}

#[test]
fn build_underflow_is_atomic() {
    let mut vm = machine("PUSH 7\nPUSH 3\nBUILD\nHALT");
    let summary = vm.run([]);
    assert!(matches!(
        summary.error,
        Some(VmError::StackUnderflow {
            instruction: "BUILD",
            required: 7,
            available: 2
        })
    ));
    assert_eq!(vm.stack(), words(&[7, 3]).as_slice());
}

#[test]
fn build_skips_zero_exponents() {
    // One pair (index 5, exponent 0): nothing left but the checksum.
    let mut vm = machine("PUSH 0\nPUSH 5\nPUSH 1\nBUILD\nHALT");
    assert_eq!(vm.run([]).error, None);
    assert_eq!(vm.stack(), words(&[64]).as_slice());
}

#[test]
fn get_prime_and_index() {
    assert_eq!(run_outputs("PUSH 96\nGET_PRIME\nPRINT\nHALT"), vec!["509"]);
    assert_eq!(run_outputs("PUSH 0\nGET_PRIME\nPRINT\nHALT"), vec!["2"]);

    let program = assemble_source("GET_PRIME_IDX\nPRINT\nHALT").unwrap();
    let mut vm = Machine::new(program).with_stack(words(&[7919]));
    assert_eq!(vm.run([]).outputs, vec!["999"]);
}

#[test]
fn get_prime_idx_rejects_composites() {
    for value in [0u64, 1, 8, 7917] {
        let program = assemble_source("GET_PRIME_IDX\nHALT").unwrap();
        let mut vm = Machine::new(program).with_stack(words(&[value]));
        let summary = vm.run([]);
        assert_eq!(
            summary.error,
            Some(VmError::NotAPrime {
                value: Word::from(value)
            }),
            "{value}"
        );
        assert_eq!(vm.stack(), words(&[value]).as_slice());
    }
}

#[test]
fn get_prime_respects_oracle_limit() {
    let program = assemble_source("GET_PRIME\nHALT").unwrap();
    let config = MachineConfig {
        prime_limit: 400,
        ..MachineConfig::default()
    };
    let mut vm = Machine::with_config(program, config).with_stack(words(&[500]));
    let summary = vm.run([]);
    assert_eq!(
        summary.error,
        Some(VmError::Oracle(OracleError::InvalidIndex {
            index: 500,
            limit: 400
        }))
    );
    assert_eq!(summary.error.map(|e| e.kind()), Some(FaultKind::Arithmetic));
}

// ==================== Integrity ====================

#[test]
fn unverified_chunk_is_an_integrity_fault() {
    let err = run_expect_fault("RAW 81");
    assert_eq!(err.kind(), FaultKind::Integrity);
    assert!(matches!(
        err,
        VmError::Chunk {
            address: 0,
            source: DecodeError::ChecksumMismatch { .. }
        }
    ));
}

#[test]
fn tampered_chunk_is_rejected() {
    let mut vm = machine("PUSH 1\nPRINT\nHALT");
    let tampered = vm.peek_program()[1].clone() * Word::from(7919u32);
    vm.patch_program(1, tampered).unwrap();
    let summary = vm.run([]);
    assert_eq!(summary.error.map(|e| e.kind()), Some(FaultKind::Integrity));
    assert!(summary.outputs.is_empty());
}

#[test]
fn zero_chunk_is_fatal() {
    let mut vm = machine("NOP\nRAW 0\nHALT");
    vm.step().unwrap();
    let record = vm.step().unwrap();
    assert_eq!(
        record.error.as_deref(),
        Some("IntegrityError: chunk at address 1: raw zero chunk")
    );
    assert_eq!(record.instruction_pointer, 1);
}

#[test]
fn inert_chunks_are_skipped() {
    assert_eq!(run_outputs("RAW 1\nRAW 64\nPUSH 2\nPRINT\nHALT"), vec!["2"]);
}

#[test]
fn unknown_opcode_fault() {
    let mut oracle = PrimeOracle::new();
    let chunk = codec::encode(&mut oracle, &[Factor::new(30, 4)]).unwrap();
    let mut vm = Machine::new(ProgramMemory::load([chunk]));
    let summary = vm.run([]);
    assert_eq!(summary.error.map(|e| e.kind()), Some(FaultKind::UnknownOpcode));
}

#[test]
fn ambiguous_opcode_fault() {
    let mut oracle = PrimeOracle::new();
    let chunk = codec::encode(&mut oracle, &[Factor::new(1, 4), Factor::new(2, 4)]).unwrap();
    let mut vm = Machine::new(ProgramMemory::load([chunk]));
    let summary = vm.run([]);
    assert_eq!(
        summary.error,
        Some(VmError::Chunk {
            address: 0,
            source: DecodeError::AmbiguousOpcode { candidates: 2 }
        })
    );
}

// ==================== Regions ====================

#[test]
fn block_runs_inline_without_its_own_record() {
    let mut vm = machine("BLOCK 2\nPUSH 4\nPRINT\nPUSH 5\nPRINT\nHALT");
    let first = vm.step().unwrap();
    assert_eq!(first.instruction_pointer, 2);
    assert_eq!(first.stack, words(&[4]));
    assert_eq!(vm.dispatches(), 2);

    let summary = vm.run([]);
    assert_eq!(summary.outputs, vec!["4", "5"]);
    assert_eq!(vm.profile().get(DispatchCategory::Region), 1);
}

#[test]
fn region_addresses_are_relative() {
    // Target 3 is the region length: it leaves the region, skipping PUSH 7.
    let source = "BLOCK 3\nPUSH 3\nJUMP\nPUSH 7\nPUSH 9\nPRINT\nHALT";
    let mut vm = machine(source);
    assert_eq!(vm.run([]).outputs, vec!["9"]);
    assert!(vm.stack().is_empty());

    let peek = "BLOCK 2\nPUSH 0\nPEEK\nPRINT\nHALT";
    let mut vm = machine(peek);
    let expected = codec::push(vm.oracle_mut(), 0).unwrap();
    assert_eq!(vm.run([]).outputs, vec![expected.to_string()]);
}

#[test]
fn region_bounds_use_region_length() {
    let err = run_expect_fault("BLOCK 2\nPUSH 2\nPEEK\nHALT");
    assert!(matches!(
        err,
        VmError::OutOfBounds {
            instruction: "PEEK",
            limit: 2,
            ..
        }
    ));

    let err = run_expect_fault("BLOCK 2\nPUSH 3\nJUMP\nHALT");
    assert_eq!(err.kind(), FaultKind::Bounds);
}

#[test]
fn poke_inside_region_is_shared() {
    // Relative slot 3 of the region is absolute address 4.
    let source = "BLOCK 4\nPUSH 1\nPUSH 3\nPOKE\nNOP\nHALT";
    let mut vm = machine(source);
    assert_eq!(vm.run([]).error, None);
    assert_eq!(vm.peek_program()[4], Word::from(1u32));
}

#[test]
fn region_length_is_clamped() {
    let mut vm = machine("BLOCK 10\nPUSH 1\nPRINT");
    let summary = vm.run([]);
    assert_eq!(summary.outputs, vec!["1"]);
    assert_eq!(vm.state(), MachineState::Halted);
}

#[test]
fn halt_inside_region_halts_machine() {
    let mut vm = machine("BLOCK 2\nHALT\nNOP\nPUSH 1\nPRINT");
    assert!(vm.run([]).outputs.is_empty());
    assert_eq!(vm.state(), MachineState::Halted);
}

#[test]
fn nested_regions_resume_outer_frame() {
    let source = "BLOCK 4\nBLOCK 2\nPUSH 1\nPRINT\nPUSH 2\nPRINT\nHALT";
    let mut vm = machine(source);
    assert_eq!(vm.run([]).outputs, vec!["1", "2"]);
    assert_eq!(vm.profile().get(DispatchCategory::Region), 2);
}

#[test]
fn spectral_region_executes_like_block() {
    let mut vm = machine("SPECTRAL 2\nPUSH 1\nPRINT\nPUSH 2\nPRINT\nHALT");
    assert_eq!(vm.run([]).outputs, vec!["1", "2"]);
    assert_eq!(vm.profile().get(DispatchCategory::Region), 1);
}

#[test]
fn empty_region_is_harmless() {
    assert_eq!(run_outputs("BLOCK 0\nPUSH 3\nPRINT\nHALT"), vec!["3"]);
}

// ==================== Data Cells ====================

#[test]
fn data_cells_are_rejected_by_default() {
    let err = run_expect_fault("DATA 1 72\nHALT");
    assert_eq!(
        err,
        VmError::Chunk {
            address: 0,
            source: DecodeError::DataCell {
                position: 1,
                payload: 72
            }
        }
    );
    assert_eq!(err.kind(), FaultKind::Decode);
}

#[test]
fn data_cells_emit_characters_when_enabled() {
    let config = MachineConfig {
        data_cells: DataCellPolicy::Emit,
        ..MachineConfig::default()
    };
    let mut vm = machine_with("DATA 1 72\nDATA 2 105\nDATA 33 33\nHALT", config);
    let summary = vm.run([]);
    assert_eq!(summary.outputs, vec!["H", "i", "!"]);
    assert_eq!(vm.profile().get(DispatchCategory::Io), 3);
}

// ==================== I/O ====================

#[test]
fn input_suspends_until_resumed() {
    let mut vm = machine("INPUT\nPRINT\nHALT");

    let record = vm.step().unwrap();
    assert!(record.needs_input);
    assert_eq!(record.output, None);
    assert_eq!(vm.state(), MachineState::AwaitingInput);
    assert_eq!(vm.step(), Err(SessionError::AwaitingInput));

    let record = vm.resume_with_input(Some(Word::from(7u32))).unwrap();
    assert!(!record.needs_input);
    assert_eq!(record.stack, words(&[7]));

    let record = vm.step().unwrap();
    assert_eq!(record.output.as_deref(), Some("7"));

    let record = vm.step().unwrap();
    assert!(record.halted);
    assert_eq!(vm.step(), Err(SessionError::Finished { state: "halted" }));
}

#[test]
fn resume_without_value_pushes_default() {
    let mut vm = machine("INPUT\nPRINT\nHALT");
    vm.step().unwrap();
    vm.resume_with_input(None).unwrap();
    assert_eq!(vm.run([]).outputs, vec!["0"]);
}

#[test]
fn resume_when_not_waiting_is_rejected() {
    let mut vm = machine("NOP\nHALT");
    assert_eq!(
        vm.resume_with_input(Some(Word::from(1u32))),
        Err(SessionError::NotAwaitingInput)
    );
    assert_eq!(vm.state(), MachineState::Running);
    assert_eq!(vm.dispatches(), 0);
}

#[test]
fn resume_with_text_parses_tokens() {
    let mut vm = machine("INPUT\nPRINT\nINPUT\nPRINT\nHALT");
    vm.step().unwrap();
    vm.resume_with_text(" 12 \n").unwrap();
    assert_eq!(vm.step().unwrap().output.as_deref(), Some("12"));
    vm.step().unwrap();
    vm.resume_with_text("").unwrap();
    assert_eq!(vm.step().unwrap().output.as_deref(), Some("0"));
}

#[test]
fn resume_with_bad_text_is_an_input_fault() {
    let mut vm = machine("NOP\nINPUT\nPRINT\nHALT");
    vm.step().unwrap();
    vm.step().unwrap();
    let record = vm.resume_with_text("seven").unwrap();
    assert_eq!(record.instruction_pointer, 1);
    assert_eq!(
        record.error.as_deref(),
        Some("InputTypeError: input \"seven\" is not a non-negative integer")
    );
    assert_eq!(vm.state(), MachineState::Errored);
    assert_eq!(vm.last_error().map(VmError::kind), Some(FaultKind::InputType));
}

#[test]
fn run_feeds_queued_inputs() {
    let mut vm = machine("INPUT\nINPUT\nADD\nPRINT\nHALT");
    let summary = vm.run(words(&[3, 4]));
    assert_eq!(summary.outputs, vec!["7"]);
    // Two INPUT dispatches, two resumes, ADD, PRINT, HALT.
    assert_eq!(summary.steps, 7);

    assert_eq!(run_outputs("INPUT\nINPUT\nADD\nPRINT\nHALT"), vec!["0"]);
}

// ==================== Records and Profile ====================

#[test]
fn step_record_snapshots_state() {
    let mut vm = machine("PUSH 8\nHALT");
    let program = vm.peek_program().to_vec();
    let record = vm.step().unwrap();
    assert_eq!(
        record,
        StepRecord {
            instruction_pointer: 1,
            stack: words(&[8]),
            program,
            output: None,
            halted: false,
            error: None,
            needs_input: false,
        }
    );
    assert!(!record.is_final());
}

#[test]
fn profile_tallies_categories() {
    let mut vm = machine("PUSH 1\nPUSH 2\nADD\nPUSH 0\nPEEK\nDROP\nPRINT\nHALT");
    assert_eq!(vm.run([]).error, None);
    let profile = vm.profile();
    assert_eq!(profile.get(DispatchCategory::Stack), 4);
    assert_eq!(profile.get(DispatchCategory::Arithmetic), 1);
    assert_eq!(profile.get(DispatchCategory::Memory), 1);
    assert_eq!(profile.get(DispatchCategory::Io), 1);
    assert_eq!(profile.get(DispatchCategory::Control), 1);
    assert_eq!(profile.total(), vm.dispatches());
}

#[test]
fn errored_machine_rejects_further_calls() {
    let mut vm = machine("PRINT");
    vm.run([]);
    assert_eq!(vm.step(), Err(SessionError::Finished { state: "errored" }));
    assert_eq!(
        vm.resume_with_input(None),
        Err(SessionError::Finished { state: "errored" })
    );
}

// ==================== Demos ====================

#[test]
fn demo_count() {
    let source = include_str!("../../../demos/count.asm");
    assert_eq!(run_outputs(source), vec!["1", "2", "3", "4", "5"]);

    let mut vm = machine(source);
    let seed = codec::push(vm.oracle_mut(), 3).unwrap();
    vm.patch_program(0, seed).unwrap();
    assert_eq!(vm.run([]).outputs, vec!["1", "2", "3"]);
}

#[test]
fn demo_hello() {
    let config = MachineConfig {
        data_cells: DataCellPolicy::Emit,
        ..MachineConfig::default()
    };
    let mut vm = machine_with(include_str!("../../../demos/hello.asm"), config);
    assert_eq!(vm.run([]).outputs.concat(), "Hi!");
}

#[test]
fn demo_sum() {
    let mut vm = machine(include_str!("../../../demos/sum.asm"));
    assert_eq!(vm.run(words(&[20, 22])).outputs, vec!["42"]);
}

#[test]
fn demo_call() {
    assert_eq!(run_outputs(include_str!("../../../demos/call.asm")), vec!["50", "100"]);
}

#[test]
fn demo_regions() {
    let mut vm = machine(include_str!("../../../demos/regions.asm"));
    assert_eq!(vm.run([]).outputs, vec!["5", "9"]);
    assert_eq!(vm.profile().get(DispatchCategory::Region), 2);
}
