//! CLI layer for orchestra-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! routing queries, chatting, running pipelines and eval suites, and
//! inspecting session history.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, PromptsCommands};
