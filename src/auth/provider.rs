//! Token acquisition
//!
//! Exchanges the configured credentials for a bearer token using the OAuth2
//! resource-owner password grant.

use super::types::{AccessToken, Credentials, TokenResponse};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info};

/// Default identity provider token endpoint
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com/services/oauth2/token";

/// Something that can turn credentials into an access token
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Acquire a token for this run
    async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken>;
}

/// Password grant against an OAuth2 token endpoint
pub struct PasswordGrantProvider {
    token_url: String,
    http: HttpClient,
}

impl PasswordGrantProvider {
    /// Create a provider for the given token endpoint
    pub fn new(token_url: impl Into<String>, http_config: HttpClientConfig) -> Result<Self> {
        let token_url = token_url.into();
        url::Url::parse(&token_url)?;
        Ok(Self {
            token_url,
            http: HttpClient::with_config(http_config)?,
        })
    }

    /// Token endpoint this provider talks to
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl CredentialProvider for PasswordGrantProvider {
    async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken> {
        credentials.validate()?;

        debug!(token_url = %self.token_url, client_id = %credentials.client_id, "Requesting access token");

        let request = RequestConfig::new().form(credentials.password_grant_form());
        let response: TokenResponse = self
            .http
            .request_json(Method::POST, &self.token_url, request)
            .await
            .map_err(Error::into_auth)?;

        let token = response.into_access_token()?;
        info!(instance_url = %token.instance_url, "Authenticated");
        Ok(token)
    }
}

impl std::fmt::Debug for PasswordGrantProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGrantProvider")
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}
