//! # metachar
//!
//! Command-line front end for MetaChar character sheets.
//!
//! The binary in `main.rs` only sets up logging; everything it runs lives
//! here so that integration tests can drive the commands directly.

pub mod cli;
pub mod config;
