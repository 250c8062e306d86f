//! Queue sink
//!
//! Each batch becomes one SQS message sent with `SendMessage`. The client
//! is built from the AWS default provider chain; region, endpoint and a
//! static key pair can be pinned in the sink settings.

use super::{batch_payload, DeliveryReceipt, Sink};
use crate::batch::Batch;
use crate::error::{is_retryable_status, Error, Result};
use crate::http::HttpClientConfig;
use async_trait::async_trait;
use aws_sdk_sqs::config::retry::RetryConfig;
use aws_sdk_sqs::config::timeout::TimeoutConfig;
use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::operation::send_message::SendMessageError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Message group used when none is configured
pub const DEFAULT_GROUP_KEY: &str = "sfdc-elk-serverless";

fn default_group_key() -> String {
    DEFAULT_GROUP_KEY.to_string()
}

/// Ordering guarantee requested from the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueOrdering {
    /// All messages share one group and are consumed in order
    Grouped {
        /// Message group id
        #[serde(default = "default_group_key")]
        group_key: String,
    },
    /// No ordering
    Unordered,
}

impl Default for QueueOrdering {
    fn default() -> Self {
        Self::Grouped {
            group_key: default_group_key(),
        }
    }
}

impl QueueOrdering {
    /// Group id attached to each message
    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Grouped { group_key } => Some(group_key),
            Self::Unordered => None,
        }
    }
}

/// Queue sink settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSinkConfig {
    /// Queue the messages go to
    pub queue_url: String,
    /// AWS region; derived from the queue URL host when unset
    #[serde(default)]
    pub region: Option<String>,
    /// Override of the SQS endpoint
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Static access key id, used together with `secret_access_key`
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Static secret access key
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,
    /// Ordering guarantee
    #[serde(default)]
    pub ordering: QueueOrdering,
    /// Attach a deduplication id built from the run id and batch sequence
    #[serde(default)]
    pub deduplicate: bool,
    /// Retries per message on retryable failures
    #[serde(default)]
    pub max_retries: u32,
}

impl QueueSinkConfig {
    /// Create settings with grouped ordering and no retries
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            region: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            ordering: QueueOrdering::default(),
            deduplicate: false,
            max_retries: 0,
        }
    }

    /// Pin the region
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Send to this endpoint instead of the regional one
    #[must_use]
    pub fn endpoint_url(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint.into());
        self
    }

    /// Use a static key pair instead of the default credential chain
    #[must_use]
    pub fn static_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Set the ordering
    #[must_use]
    pub fn ordering(mut self, ordering: QueueOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Enable deduplication ids
    #[must_use]
    pub fn deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// Region to sign for
    ///
    /// `https://sqs.eu-west-1.amazonaws.com/123/q` yields `eu-west-1`.
    pub fn resolved_region(&self) -> Option<String> {
        if let Some(region) = &self.region {
            return Some(region.clone());
        }
        let url = url::Url::parse(&self.queue_url).ok()?;
        let mut labels = url.host_str()?.split('.');
        match (labels.next(), labels.next()) {
            (Some("sqs"), Some(region)) if !region.is_empty() && region != "amazonaws" => {
                Some(region.to_string())
            }
            _ => None,
        }
    }

    /// Check the settings
    pub fn validate(&self) -> Result<()> {
        if self.queue_url.is_empty() {
            return Err(Error::missing_field("sink.queue_url"));
        }
        url::Url::parse(&self.queue_url)
            .map_err(|e| Error::invalid_value("sink.queue_url", e.to_string()))?;
        if let Some(endpoint) = &self.endpoint_url {
            url::Url::parse(endpoint)
                .map_err(|e| Error::invalid_value("sink.endpoint_url", e.to_string()))?;
        }
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) => return Err(Error::missing_field("sink.secret_access_key")),
            (None, Some(_)) => return Err(Error::missing_field("sink.access_key_id")),
            _ => {}
        }
        if let QueueOrdering::Grouped { group_key } = &self.ordering {
            if group_key.is_empty() {
                return Err(Error::invalid_value(
                    "sink.ordering.group_key",
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for QueueSinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSinkConfig")
            .field("queue_url", &self.queue_url)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("ordering", &self.ordering)
            .field("deduplicate", &self.deduplicate)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Sends one SQS message per batch
pub struct QueueSink {
    config: QueueSinkConfig,
    client: aws_sdk_sqs::Client,
    run_id: String,
}

impl QueueSink {
    /// Build the SQS client and the sink
    ///
    /// `http` supplies the per-attempt timeout and the retry backoff; the
    /// retry count comes from the sink settings.
    pub async fn connect(config: QueueSinkConfig, http: &HttpClientConfig) -> Result<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.resolved_region() {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id,
                secret,
                None,
                None,
                "audit-export",
            ));
        }
        let sdk_config = loader.load().await;

        let sqs_config = aws_sdk_sqs::config::Builder::from(&sdk_config)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_attempt_timeout(http.timeout)
                    .build(),
            )
            .retry_config(
                RetryConfig::standard()
                    .with_max_attempts(config.max_retries.saturating_add(1))
                    .with_initial_backoff(http.initial_backoff)
                    .with_max_backoff(http.max_backoff),
            )
            .build();

        debug!(
            queue_url = %config.queue_url,
            region = config.resolved_region().as_deref().unwrap_or("-"),
            "Created SQS client"
        );
        Ok(Self {
            config,
            client: aws_sdk_sqs::Client::from_conf(sqs_config),
            run_id: String::new(),
        })
    }

    /// Set the run id used for deduplication ids
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    fn deduplication_id(&self, sequence: u64) -> Option<String> {
        if !self.config.deduplicate {
            return None;
        }
        if self.run_id.is_empty() {
            Some(sequence.to_string())
        } else {
            Some(format!("{}-{sequence}", self.run_id))
        }
    }
}

#[async_trait]
impl Sink for QueueSink {
    fn name(&self) -> &'static str {
        "queue"
    }

    async fn deliver(&mut self, batch: &Batch) -> Result<DeliveryReceipt> {
        let message_body = batch_payload(batch)?;
        let payload_bytes = message_body.len();

        debug!(
            sequence = batch.sequence,
            bytes = payload_bytes,
            "Sending batch to queue"
        );

        let output = self
            .client
            .send_message()
            .queue_url(&self.config.queue_url)
            .message_body(message_body)
            .set_message_group_id(self.config.ordering.group_id().map(String::from))
            .set_message_deduplication_id(self.deduplication_id(batch.sequence))
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let message_id = output.message_id().map(String::from);
        info!(
            sequence = batch.sequence,
            records = batch.len(),
            message_id = message_id.as_deref().unwrap_or("-"),
            "Batch enqueued"
        );

        Ok(DeliveryReceipt {
            sequence: batch.sequence,
            records: batch.len(),
            payload_bytes,
            message_id,
        })
    }
}

impl std::fmt::Debug for QueueSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSink")
            .field("config", &self.config)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

/// Map a failed `SendMessage` to a delivery error
fn send_error(err: &SdkError<SendMessageError>) -> Error {
    let retryable = match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
        SdkError::ServiceError(service) => {
            is_retryable_status(service.raw().status().as_u16())
                || matches!(
                    service.err().code(),
                    Some("ThrottlingException" | "RequestThrottled")
                )
        }
        _ => false,
    };
    Error::delivery(
        format!("SendMessage failed: {}", DisplayErrorContext(err)),
        retryable,
    )
}
