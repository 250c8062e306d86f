//! CLI runner - executes commands

use crate::auth::{CredentialProvider, PasswordGrantProvider};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::ExportConfig;
use crate::engine::{new_run_id, ExportPipeline, PipelineConfig, RunOutcome};
use crate::error::{Result, ResultExt};
use crate::pagination::{PageSource, QueryClient};
use crate::query::QueryWindow;
use crate::sink::{FileSinkConfig, SinkConfig};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    ///
    /// Commands other than `run` report success once they complete.
    pub async fn run(&self) -> Result<RunOutcome> {
        match &self.cli.command {
            Commands::Run {
                window,
                max_batch_bytes,
                max_pages,
                output,
                separator,
            } => {
                let mut config = self.load_config()?;
                apply_overrides(
                    &mut config,
                    window.as_deref(),
                    *max_batch_bytes,
                    *max_pages,
                    output.clone(),
                    separator.clone(),
                )?;
                self.export(&config).await
            }
            Commands::Check => self.check().await,
            Commands::Validate => self.validate(),
            Commands::Query { window } => self.query(window.as_deref()),
        }
    }

    /// Load configuration from file and environment
    fn load_config(&self) -> Result<ExportConfig> {
        let mut config = match &self.cli.config {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                ExportConfig::load(path)?
            }
            None => ExportConfig::default(),
        };
        config
            .apply_process_env()
            .context("Failed to read environment")?;
        Ok(config)
    }

    /// Run one export
    async fn export(&self, config: &ExportConfig) -> Result<RunOutcome> {
        config.validate()?;

        let run_id = new_run_id();
        let http = config.http.client_config();
        let provider = PasswordGrantProvider::new(&config.login_url, http.clone())?;
        let source = QueryClient::new(&config.api_version, http)?;
        let sink = config
            .sink_config()?
            .build(&config.http.delivery_config(), &run_id)
            .await?;

        let mut pipeline = ExportPipeline::new(Box::new(provider), Box::new(source), sink)
            .with_config(
                PipelineConfig::new()
                    .with_max_batch_bytes(config.max_batch_bytes)
                    .with_max_pages(config.max_pages),
            )
            .with_run_id(run_id);

        let report = pipeline.run(&config.credentials, &config.query()).await;

        let mut message = report.summary();
        message["type"] = json!("RUN_REPORT");
        self.output_message(&message);

        Ok(report.outcome())
    }

    /// Authenticate and fetch the first page
    async fn check(&self) -> Result<RunOutcome> {
        let config = self.load_config()?;
        config.credentials.validate()?;
        config.validate_settings()?;

        let http = config.http.client_config();
        let provider = PasswordGrantProvider::new(&config.login_url, http.clone())?;
        let source = QueryClient::new(&config.api_version, http)?;

        let result = async {
            let token = provider.acquire_token(&config.credentials).await?;
            let page = source
                .execute_query(&config.query().to_soql(), &token)
                .await?;
            Ok::<_, crate::error::Error>((token, page))
        }
        .await;

        match result {
            Ok((token, page)) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": "Connection successful",
                        "instanceUrl": token.instance_url,
                        "totalSize": page.total_size,
                        "firstPageRecords": page.len(),
                    }
                }));
                Ok(RunOutcome::SUCCESS)
            }
            Err(e) => {
                self.output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Connection failed: {e}")
                    }
                }));
                Ok(RunOutcome::FAILED)
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<RunOutcome> {
        let config = self.load_config()?;
        config.validate()?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Configuration is valid: {} sink, window '{}', batches up to {} bytes",
                    config.sink_config()?.name(),
                    config.query_window,
                    config.max_batch_bytes
                )
            }
        }));

        Ok(RunOutcome::SUCCESS)
    }

    /// Print the query
    fn query(&self, window: Option<&str>) -> Result<RunOutcome> {
        let mut config = self.load_config()?;
        if let Some(window) = window {
            config.query_window = window.parse()?;
        }

        self.output_message(&json!({
            "type": "QUERY",
            "query": config.query().to_soql(),
            "window": config.query_window.to_string(),
        }));

        Ok(RunOutcome::SUCCESS)
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Apply `run` flags on top of file and environment settings
fn apply_overrides(
    config: &mut ExportConfig,
    window: Option<&str>,
    max_batch_bytes: Option<usize>,
    max_pages: Option<u64>,
    output: Option<PathBuf>,
    separator: Option<String>,
) -> Result<()> {
    if let Some(window) = window {
        config.query_window = window.parse::<QueryWindow>()?;
    }
    if let Some(max) = max_batch_bytes {
        config.max_batch_bytes = max;
    }
    if let Some(max) = max_pages {
        config.max_pages = max;
    }
    if let Some(path) = output {
        config.sink = Some(SinkConfig::File(FileSinkConfig { path, separator }));
    }
    Ok(())
}
