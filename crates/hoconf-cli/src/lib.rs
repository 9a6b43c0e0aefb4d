//! hoconf CLI library
//!
//! Exposes the CLI entry point so the binary stays a one-liner.
//!
//! # Safety
//!
//! This crate contains no unsafe code.

#![forbid(unsafe_code)]

mod cli;

pub use cli::run;
