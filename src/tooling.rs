//! Tooling & Integration Layer
//!
//! The command-line front end and its terminal renderings.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands, ShutdownSignal, TerminalEditor};
