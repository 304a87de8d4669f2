//! Chunk program runner.
//!
//! Loads a program and runs it to completion, printing each output token on
//! its own line. INPUT reads one line from stdin.
//!
//! # Usage
//! ```text
//! chunkvm <program> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program`: Program text (one decimal chunk per line), or assembly when
//!   the file name ends in `.asm`
//!
//! # Options
//! - `--budget <n>`: Instruction budget (defaults to 1000)
//! - `--emit-data`: Execute data cells as character output
//! - `--prime-limit <n>`: Maximum number of primes the oracle may cache
//! - `--push-at <addr>:<k>`: Patch a `PUSH k` chunk into `addr` before the run
//! - `--trace`: Log every dispatch to stderr
//! - `--profile`: Print dispatch counts per category after the run
//! - `--disasm`: Print a listing of the program instead of running it

use chunkvm::primes::oracle::PrimeOracle;
use chunkvm::utils::log::VERBOSE;
use chunkvm::virtual_machine::assembler::assemble_file;
use chunkvm::virtual_machine::codec;
use chunkvm::virtual_machine::disassembler::disassemble;
use chunkvm::virtual_machine::errors::ProgramError;
use chunkvm::virtual_machine::program::ProgramMemory;
use chunkvm::virtual_machine::state::MachineState;
use chunkvm::virtual_machine::vm::budget::DispatchProfile;
use chunkvm::virtual_machine::vm::{DataCellPolicy, Machine, MachineConfig};
use chunkvm::{error, info};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::sync::atomic::Ordering;

/// A `--push-at` request.
struct Seed {
    address: usize,
    index: usize,
}

fn parse_seed(arg: &str) -> Option<Seed> {
    let (address, index) = arg.split_once(':')?;
    Some(Seed {
        address: address.trim().parse().ok()?,
        index: index.trim().parse().ok()?,
    })
}

/// Returns the value following a flag, or exits.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i) {
        Some(v) => v,
        None => {
            error!("{flag} requires an argument");
            process::exit(1);
        }
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        error!("Invalid value for {flag}: '{value}' is not a valid number");
        process::exit(1);
    })
}

fn load_program(path: &str) -> Result<ProgramMemory, ProgramError> {
    if Path::new(path).extension().is_some_and(|ext| ext == "asm") {
        assemble_file(path)
    } else {
        ProgramMemory::load_file(path)
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let program_path = &args[1];
    let mut config = MachineConfig::default();
    let mut seeds: Vec<Seed> = Vec::new();
    let mut show_profile = false;
    let mut disasm_only = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ "--budget" => {
                i += 1;
                config.instruction_budget = parse_number(k, flag_value(&args, i, k));
                i += 1;
            }
            k @ "--prime-limit" => {
                i += 1;
                config.prime_limit = parse_number(k, flag_value(&args, i, k));
                i += 1;
            }
            k @ "--push-at" => {
                i += 1;
                let value = flag_value(&args, i, k);
                match parse_seed(value) {
                    Some(seed) => seeds.push(seed),
                    None => {
                        error!("Invalid value for {k}: expected <addr>:<k>, got '{value}'");
                        process::exit(1);
                    }
                }
                i += 1;
            }
            "--emit-data" => {
                config.data_cells = DataCellPolicy::Emit;
                i += 1;
            }
            "--trace" => {
                VERBOSE.store(true, Ordering::Relaxed);
                i += 1;
            }
            "--profile" => {
                show_profile = true;
                i += 1;
            }
            "--disasm" => {
                disasm_only = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if !Path::new(program_path).exists() {
        error!("Program file does not exist: {}", program_path);
        process::exit(1);
    }

    let program = match load_program(program_path) {
        Ok(p) => p,
        // Assembly diagnostics are already logged with source context.
        Err(ProgramError::Assembly { .. }) => process::exit(1),
        Err(e) => {
            error!("Failed to load program: {}", e);
            process::exit(1);
        }
    };

    if disasm_only {
        let mut oracle = PrimeOracle::with_limit(config.prime_limit);
        print!("{}", disassemble(&mut oracle, program.as_slice()));
        return;
    }

    let mut vm = Machine::with_config(program, config);
    for seed in &seeds {
        let chunk = codec::push(vm.oracle_mut(), seed.index).unwrap_or_else(|e| {
            error!("Cannot build PUSH {}: {e}", seed.index);
            process::exit(1)
        });
        if let Err(e) = vm.patch_program(seed.address, chunk) {
            error!("--push-at: {e}");
            process::exit(1);
        }
        info!("Seeded PUSH {} at address {}", seed.index, seed.address);
    }

    let code = execute(&mut vm);
    if show_profile {
        print_profile(vm.profile());
    }
    process::exit(code);
}

/// Steps `vm` to completion. Returns the process exit code.
fn execute(vm: &mut Machine) -> i32 {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let step = match vm.state() {
            MachineState::Running => vm.step(),
            MachineState::AwaitingInput => {
                eprint!("? ");
                let _ = io::stderr().flush();
                match lines.next() {
                    Some(Ok(line)) => vm.resume_with_text(&line),
                    Some(Err(e)) => {
                        error!("Failed to read input: {e}");
                        return 1;
                    }
                    None => vm.resume_with_input(None),
                }
            }
            MachineState::Halted => return 0,
            MachineState::Errored => return 2,
        };

        let record = match step {
            Ok(record) => record,
            Err(e) => {
                error!("{e}");
                return 1;
            }
        };
        if let Some(token) = &record.output {
            println!("{token}");
        }
        if let Some(message) = &record.error {
            error!("{message} (at address {})", record.instruction_pointer);
        }
    }
}

fn print_profile(profile: &DispatchProfile) {
    let total = profile.total();
    let cat_w = 2 + profile
        .iter()
        .map(|(c, _)| c.as_str().chars().count())
        .max()
        .unwrap_or(0)
        .max("total".len());
    let amt_w = total.to_string().len();
    let dash_w = cat_w + 1 + amt_w + 2 + "( 100.0%)".len();

    eprintln!("Dispatch Profile:");
    eprintln!("{}", "-".repeat(dash_w));
    for (category, amount) in profile.iter() {
        if amount == 0 {
            continue;
        }
        let percent = if total > 0 {
            (amount as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        eprintln!(
            "{:<cat_w$} {:>amt_w$} ({:>5.1}%)",
            category.as_str(),
            amount,
            percent,
        );
    }
    eprintln!("{}", "-".repeat(dash_w));
    eprintln!("{:<cat_w$} {:>amt_w$} ({:>5.1}%)", "total", total, 100.0);
}

const USAGE: &str = "\
Chunk Program Runner

USAGE:
    {program} <program> [OPTIONS]

ARGS:
    <program>    Program text (one chunk per line), or assembly ending in .asm

OPTIONS:
    --budget <n>            Instruction budget (defaults to 1000)
    --emit-data             Execute data cells as character output
    --prime-limit <n>       Maximum number of primes the oracle may cache
    --push-at <addr>:<k>    Patch PUSH k into <addr> before the run (repeatable)
    --trace                 Log every dispatch to stderr
    --profile               Print dispatch counts per category after the run
    --disasm                Print a program listing instead of running it
    -h, --help              Print this help message

EXIT STATUS:
    0    halted
    1    usage, loading or input error
    2    the run faulted

EXAMPLES:
    # Count to 5, seeding the limit
    {program} demos/count.asm --push-at 0:5

    # Spell out data cells
    {program} demos/hello.asm --emit-data

    # Show what a program contains
    {program} demos/hello.asm --disasm
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
