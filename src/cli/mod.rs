//! CLI module
//!
//! Command-line interface for running exports.
//!
//! # Commands
//!
//! - `run` - Export audit entries to the configured sink
//! - `check` - Authenticate and fetch the first page
//! - `validate` - Validate configuration offline
//! - `query` - Print the query a run would send

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
