//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Audit trail exporter
#[derive(Parser, Debug)]
#[command(name = "audit-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON); environment variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export audit entries to the configured sink
    Run {
        /// Query window, e.g. `1d` or `last 7 days`
        #[arg(short, long)]
        window: Option<String>,

        /// Batch ceiling in bytes
        #[arg(long)]
        max_batch_bytes: Option<usize>,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u64>,

        /// Append batches to this file instead of the configured sink
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Written after every batch in file output
        #[arg(long, requires = "output")]
        separator: Option<String>,
    },

    /// Test credentials and query access
    Check,

    /// Validate configuration without network access
    Validate,

    /// Print the query a run would send
    Query {
        /// Query window, e.g. `1d` or `last 7 days`
        #[arg(short, long)]
        window: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
