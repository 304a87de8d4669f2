//! Crate-wide helpers.

pub mod log;
