//! Command-line interface for reward-forge.
//!
//! Provides commands for scoring trajectory files and decoding ground-truth
//! call expressions.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
