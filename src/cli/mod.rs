//! CLI module for tickpoll - command-line interface and subcommands.
//!
//! Provides quota planning and a demo run of the scheduler.

pub mod commands;

pub use commands::Cli;
