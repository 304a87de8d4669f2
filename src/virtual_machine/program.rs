//! Program memory and its text format.
//!
//! A program is a flat sequence of chunks addressed from 0. On disk it is one
//! decimal integer per line; blank lines and lines starting with `#` are skipped.

use crate::virtual_machine::errors::ProgramError;
use crate::virtual_machine::operand::{Word, parse_word};
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';

/// Mutable chunk buffer owned by a single run.
///
/// The length is fixed at load time; writes replace chunks in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramMemory {
    chunks: Vec<Word>,
}

impl ProgramMemory {
    pub fn load(chunks: impl IntoIterator<Item = Word>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
        }
    }

    /// Parses the text format, reporting the 1-based line of the first bad entry.
    pub fn parse_text(text: &str) -> Result<Self, ProgramError> {
        let mut chunks = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let token = line.trim();
            if token.is_empty() || token.starts_with(COMMENT_CHAR) {
                continue;
            }
            let chunk = parse_word(token).ok_or_else(|| ProgramError::InvalidLine {
                line: line_no + 1,
                token: token.to_string(),
            })?;
            chunks.push(chunk);
        }
        Ok(Self { chunks })
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ProgramError> {
        let path_ref = path.as_ref();
        let text = fs::read_to_string(path_ref).map_err(|e| ProgramError::Io {
            path: path_ref.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse_text(&text)
    }

    /// Renders the text format, one chunk per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for chunk in &self.chunks {
            let _ = writeln!(out, "{chunk}");
        }
        out
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, address: usize) -> Option<&Word> {
        self.chunks.get(address)
    }

    /// Replaces the chunk at `address`, returning the old one. `None` when out of range.
    pub fn set(&mut self, address: usize, chunk: Word) -> Option<Word> {
        self.chunks
            .get_mut(address)
            .map(|slot| std::mem::replace(slot, chunk))
    }

    pub fn as_slice(&self) -> &[Word] {
        &self.chunks
    }
}

impl From<Vec<Word>> for ProgramMemory {
    fn from(chunks: Vec<Word>) -> Self {
        Self { chunks }
    }
}
