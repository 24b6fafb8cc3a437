//! Integration tests for the part mirror

mod cli_commands;
mod daemon_flow;
mod fixtures;
mod lock_handling;
mod session_scenario;
