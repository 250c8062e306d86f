// Allow common clippy pedantic lints
#![allow(clippy::must_use_candidate)]

//! audit-export CLI
//!
//! Command-line interface for exporting audit trail entries

use audit_export::cli::{Cli, Runner};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let runner = Runner::new(cli);

    match runner.run().await {
        Ok(outcome) if outcome.is_success() => {}
        Ok(outcome) => {
            tracing::error!(status = outcome.status_code, "{}", outcome.body);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
