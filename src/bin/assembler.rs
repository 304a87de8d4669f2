//! Assembly to chunk program compiler CLI.
//!
//! Reads assembly source files and writes the program text format: one
//! decimal chunk per line.
//!
//! # Usage
//! ```text
//! assembler <input.asm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.asm`: Assembly source file to compile
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.txt`)
//! - `-l, --listing`: Print an address-prefixed disassembly of the result
//!
//! # Examples
//! ```text
//! assembler program.asm
//! assembler program.asm -o program.txt
//! assembler program.asm -l
//! ```

use chunkvm::primes::oracle::PrimeOracle;
use chunkvm::virtual_machine::assembler::assemble_file;
use chunkvm::virtual_machine::disassembler::disassemble;
use chunkvm::virtual_machine::errors::ProgramError;
use chunkvm::{error, info};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut listing = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
                i += 1;
            }
            "--listing" | "-l" => {
                listing = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let output_path = output_path.unwrap_or_else(|| {
        let p = Path::new(input_path);
        let stem = p.file_stem().unwrap_or_default().to_string_lossy();
        let parent = p.parent().unwrap_or(Path::new("."));
        parent
            .join(format!("{}.txt", stem))
            .to_string_lossy()
            .into_owned()
    });

    if let Some(parent) = Path::new(&output_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        error!("Output directory does not exist: {}", parent.display());
        process::exit(1);
    }

    let program = match assemble_file(input_path) {
        Ok(p) => p,
        // Assembly diagnostics are already logged with source context.
        Err(ProgramError::Assembly { .. }) => process::exit(1),
        Err(e) => {
            error!("Assembly failed: {}", e);
            process::exit(1);
        }
    };

    let text = program.to_text();
    if let Err(e) = fs::write(&output_path, &text) {
        error!("Failed to write output file: {}", e);
        process::exit(1);
    }

    info!(
        "Compiled {} -> {} ({} chunks)",
        input_path,
        output_path,
        program.len()
    );

    if listing {
        let mut oracle = PrimeOracle::new();
        print!("{}", disassemble(&mut oracle, program.as_slice()));
    }
}

const USAGE: &str = "\
Chunk Assembler

USAGE:
    {program} <input.asm> [OPTIONS]

ARGS:
    <input.asm>    Assembly source file to compile

OPTIONS:
    -o, --output <file>    Output file path (defaults to <input>.txt)
    -l, --listing          Print a disassembly of the compiled program
    -h, --help             Print this help message

EXAMPLES:
    # Compile to default output name
    {program} program.asm

    # Compile with explicit output
    {program} program.asm -o program.txt

    # Compile and show what was produced
    {program} program.asm -l
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
