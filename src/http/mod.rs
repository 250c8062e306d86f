//! HTTP client module
//!
//! Provides the HTTP client used for every network call of a run.
//!
//! # Features
//!
//! - **Bounded Retries**: Configurable retry count with backoff (off by default)
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Timeouts**: Every request is bounded (30s default)

mod client;
mod rate_limit;

pub use client::{
    join_url, HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig,
    DEFAULT_TIMEOUT,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
