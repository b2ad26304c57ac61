//! CLI layer for fincore.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing the store, ingesting documents, and querying questions
//! and facts.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
