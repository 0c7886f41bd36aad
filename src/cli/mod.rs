//! CLI module for glosser - command-line interface and subcommands.
//!
//! Drives the scheduler against YAML page fixtures.

pub mod commands;

pub use commands::Cli;
