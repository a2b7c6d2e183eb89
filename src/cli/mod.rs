//! CLI command handlers
//!
//! Argument parsing, command routing and one handler module per command.

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands};
pub use router::execute_command;
