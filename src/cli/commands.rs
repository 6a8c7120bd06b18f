//! CLI command definitions using clap.
//!
//! - plan: compute the flooding interval for a set of polls under a quota
//! - run: register demo polls and let the scheduler dispatch them

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tickpoll - a quota-aware in-process task scheduler
#[derive(Parser, Debug)]
#[command(name = "tickpoll")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how a per-minute quota would be shared between polls
    Plan {
        /// Quota in runs per minute (defaults to the configured value)
        #[arg(short, long)]
        rate: Option<f64>,

        /// Fixed poll interval in milliseconds (repeatable)
        #[arg(short, long = "interval")]
        intervals: Vec<i64>,

        /// Number of polls without a fixed interval
        #[arg(short, long, default_value_t = 0)]
        flooding: usize,
    },

    /// Register demo polls and run the scheduler for a while
    Run {
        /// Quota in runs per minute (defaults to the configured value)
        #[arg(short, long)]
        rate: Option<f64>,

        /// Fixed poll interval in milliseconds (repeatable)
        #[arg(short, long = "interval")]
        intervals: Vec<i64>,

        /// Number of polls without a fixed interval
        #[arg(short, long, default_value_t = 1)]
        flooding: usize,

        /// How long to run before printing stats
        #[arg(short, long, default_value_t = 10)]
        duration_secs: u64,
    },
}
