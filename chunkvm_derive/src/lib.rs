//! Derive macros for the chunkvm crate.
//!
//! Provides `#[derive(Error)]`, which generates `Display`, `std::error::Error`
//! and `From` conversions for error types (a small stand-in for `thiserror`).

mod error;

use proc_macro::TokenStream;

/// Implements `Display`, `Error` and `#[from]` conversions for an error type.
#[proc_macro_derive(Error, attributes(error, from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
