//! Assembly language for chunk programs.
//!
//! Converts human-readable assembly into program memory, one chunk per
//! statement. Opcode mnemonics come from [`for_each_opcode!`](crate::for_each_opcode)
//! through [`Opcode::from_mnemonic`].
//!
//! # Syntax
//!
//! ```text
//! label: MNEMONIC operand...   # optional comment
//! ```
//!
//! - `PUSH <k|label>`: push prime index `k`, or the address of `label`
//! - every other opcode mnemonic takes no operand (`ADD`, `PRINT`, `HALT`, ...)
//! - `BLOCK <n|label>` / `SPECTRAL <n|label>`: region header over the next `n`
//!   chunks, or over every chunk up to (not including) `label`
//! - `DATA <position> <payload>`: positional data cell
//! - `RAW <integer>`: a literal chunk, emitted unchecked
//! - Mnemonics are uppercase, `#` starts a comment, commas are ignored
//!
//! Label addresses are absolute program addresses. Code inside a region sees
//! addresses relative to the region start, so jump targets there are best
//! written as numbers.

use crate::error;
use crate::primes::oracle::PrimeOracle;
use crate::virtual_machine::codec::{self, CodecError};
use crate::virtual_machine::errors::ProgramError;
use crate::virtual_machine::isa::{Opcode, RegionKind};
use crate::virtual_machine::operand::{Word, parse_word};
use crate::virtual_machine::program::ProgramMemory;
use num_traits::ToPrimitive;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';
const RAW_KEYWORD: &str = "RAW";
const DATA_KEYWORD: &str = "DATA";

/// Formats a compiler-style diagnostic for assembly failures.
pub fn render_assembly_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    column: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{column}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(column.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}

/// Logs a diagnostic for a failed assembly.
fn log_assembly_error(file: &str, source: &str, err: &ProgramError) {
    match err {
        ProgramError::Assembly {
            line,
            column,
            message,
        } => error!(
            "{}",
            render_assembly_diagnostic(file, source, *line, *column, message)
        ),
        other => error!("{other}"),
    }
}

/// Error inside one statement; the line is attached by the caller.
#[derive(Debug)]
struct AsmError {
    column: usize,
    message: String,
}

impl AsmError {
    fn at(token: &Token<'_>, message: impl Into<String>) -> Self {
        Self {
            column: token.offset,
            message: message.into(),
        }
    }

    fn on_line(self, line: usize) -> ProgramError {
        ProgramError::Assembly {
            line,
            column: self.column,
            message: self.message,
        }
    }
}

/// Label table built during the first pass.
pub struct AsmContext {
    labels: HashMap<String, usize>,
}

impl AsmContext {
    pub fn new() -> Self {
        Self {
            labels: HashMap::new(),
        }
    }

    /// Registers a label at the given program address.
    fn define_label(&mut self, name: &str, address: usize) -> Result<(), String> {
        if self.labels.contains_key(name) {
            return Err(format!("duplicate label `{name}`"));
        }
        self.labels.insert(name.to_string(), address);
        Ok(())
    }

    /// Resolves a label to its program address.
    pub fn resolve_label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }
}

impl Default for AsmContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column in the line.
    offset: usize,
}

/// Splits a line into whitespace/comma separated tokens, dropping any comment.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let code = line.split(COMMENT_CHAR).next().unwrap_or("");
    let mut out = Vec::with_capacity(4);
    let mut start: Option<usize> = None;

    for (i, ch) in code.char_indices() {
        let separator = ch.is_whitespace() || ch == ',';
        match (start, separator) {
            (None, false) => start = Some(i),
            (Some(s), true) => {
                out.push(Token {
                    text: &code[s..i],
                    offset: s + 1,
                });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &code[s..],
            offset: s + 1,
        });
    }
    out
}

/// Checks if a token is a label definition (ends with `:`).
fn is_label_def(tok: &str) -> bool {
    tok.len() > 1 && tok.ends_with(LABEL_SUFFIX)
}

fn label_name(tok: &str) -> &str {
    tok.trim_end_matches(LABEL_SUFFIX)
}

/// Labels are identifiers: a letter or `_`, then letters, digits or `_`.
fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn region_keyword(tok: &str) -> Option<RegionKind> {
    RegionKind::ALL.into_iter().find(|k| k.keyword() == tok)
}

fn is_known_mnemonic(tok: &str) -> bool {
    tok == RAW_KEYWORD
        || tok == DATA_KEYWORD
        || region_keyword(tok).is_some()
        || Opcode::from_mnemonic(tok).is_some()
}

/// One chunk-producing line after the first pass.
struct Statement<'a> {
    line: usize,
    address: usize,
    tokens: Vec<Token<'a>>,
}

fn expect_operands<'t, 'a>(
    statement: &'t Statement<'a>,
    count: usize,
) -> Result<&'t [Token<'a>], AsmError> {
    let head = &statement.tokens[0];
    let operands = &statement.tokens[1..];
    if operands.len() != count {
        return Err(AsmError::at(
            head,
            format!(
                "`{}` expects {count} operand(s), found {}",
                head.text,
                operands.len()
            ),
        ));
    }
    Ok(operands)
}

/// Parses a prime index or position literal.
fn parse_index(tok: &Token<'_>) -> Result<usize, AsmError> {
    parse_word(tok.text)
        .and_then(|w| w.to_usize())
        .ok_or_else(|| AsmError::at(tok, format!("`{}` is not a valid index", tok.text)))
}

/// Parses an index literal, or resolves a label to its address.
fn parse_index_or_label(ctx: &AsmContext, tok: &Token<'_>) -> Result<usize, AsmError> {
    if tok.text.starts_with(|c: char| c.is_ascii_digit()) {
        return parse_index(tok);
    }
    ctx.resolve_label(tok.text)
        .ok_or_else(|| AsmError::at(tok, format!("undefined label `{}`", tok.text)))
}

fn codec_error(tok: &Token<'_>, err: CodecError) -> AsmError {
    AsmError::at(tok, err.to_string())
}

/// Second pass: encodes one statement.
fn emit(
    oracle: &mut PrimeOracle,
    ctx: &AsmContext,
    statement: &Statement<'_>,
) -> Result<Word, AsmError> {
    let head = &statement.tokens[0];

    if head.text == RAW_KEYWORD {
        let operands = expect_operands(statement, 1)?;
        return parse_word(operands[0].text).ok_or_else(|| {
            AsmError::at(
                &operands[0],
                format!("`{}` is not a non-negative integer", operands[0].text),
            )
        });
    }

    if head.text == DATA_KEYWORD {
        let operands = expect_operands(statement, 2)?;
        let position = parse_index(&operands[0])?;
        let payload = parse_index(&operands[1])?;
        return codec::data_cell(oracle, position, payload).map_err(|e| codec_error(head, e));
    }

    if let Some(kind) = region_keyword(head.text) {
        let operands = expect_operands(statement, 1)?;
        let tok = &operands[0];
        let length = if tok.text.starts_with(|c: char| c.is_ascii_digit()) {
            parse_index(tok)?
        } else {
            let end = parse_index_or_label(ctx, tok)?;
            end.checked_sub(statement.address + 1).ok_or_else(|| {
                AsmError::at(tok, format!("region end `{}` precedes the header", tok.text))
            })?
        };
        return codec::region_header(oracle, kind, length).map_err(|e| codec_error(head, e));
    }

    let opcode = Opcode::from_mnemonic(head.text)
        .ok_or_else(|| AsmError::at(head, format!("unknown mnemonic `{}`", head.text)))?;
    let operand = if opcode.has_operand() {
        let operands = expect_operands(statement, 1)?;
        Some(parse_index_or_label(ctx, &operands[0])?)
    } else {
        expect_operands(statement, 0)?;
        None
    };
    codec::instruction(oracle, opcode, operand).map_err(|e| codec_error(head, e))
}

/// Assembles source text into program memory.
///
/// Two passes:
/// 1. tokenize lines, assign one address per statement, record labels
/// 2. encode every statement with labels resolved
pub fn assemble_source(source: impl Into<String>) -> Result<ProgramMemory, ProgramError> {
    assemble_source_with_name(source.into(), "<source>")
}

fn assemble_inner(source: &str) -> Result<ProgramMemory, ProgramError> {
    let mut ctx = AsmContext::new();
    let mut statements: Vec<Statement> = Vec::new();

    // First pass: labels and addresses
    for (line_no, line) in source.lines().enumerate() {
        let line_no = line_no + 1;
        let mut tokens = tokenize(line);

        while let Some(first) = tokens.first()
            && is_label_def(first.text)
        {
            let name = label_name(first.text);
            if !is_valid_label(name) {
                return Err(AsmError::at(first, format!("invalid label name `{name}`")).on_line(line_no));
            }
            ctx.define_label(name, statements.len())
                .map_err(|message| AsmError::at(first, message).on_line(line_no))?;
            tokens.remove(0);
        }

        let Some(head) = tokens.first() else {
            continue;
        };
        if !is_known_mnemonic(head.text) {
            return Err(
                AsmError::at(head, format!("unknown mnemonic `{}`", head.text)).on_line(line_no)
            );
        }
        statements.push(Statement {
            line: line_no,
            address: statements.len(),
            tokens,
        });
    }

    // Second pass: emit chunks
    let mut oracle = PrimeOracle::new();
    let mut chunks = Vec::with_capacity(statements.len());
    for statement in &statements {
        let chunk = emit(&mut oracle, &ctx, statement).map_err(|e| e.on_line(statement.line))?;
        chunks.push(chunk);
    }

    Ok(ProgramMemory::load(chunks))
}

/// Assembles source with an associated filename for error diagnostics.
fn assemble_source_with_name(source: String, source_name: &str) -> Result<ProgramMemory, ProgramError> {
    let result = assemble_inner(&source);
    if let Err(err) = &result {
        log_assembly_error(source_name, &source, err);
    }
    result
}

/// Convenience: assemble directly from a file path.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<ProgramMemory, ProgramError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| ProgramError::Io {
        path: path_ref.display().to_string(),
        message: e.to_string(),
    })?;
    assemble_source_with_name(source, &path_ref.display().to_string())
}
