//! Credential and token types
//!
//! `Credentials` are loaded once at startup and never change during a run.
//! `AccessToken` is what the identity provider hands back: a bearer token and
//! the tenant-specific base URL every later API call goes to.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Resource-owner password credentials for the token exchange
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Connected app client id
    #[serde(default)]
    pub client_id: String,
    /// Connected app client secret
    #[serde(default)]
    pub client_secret: String,
    /// Integration user name
    #[serde(default)]
    pub username: String,
    /// Integration user password (with security token appended, if any)
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Create a fully populated credential bundle
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Fail with a configuration error naming the first empty field
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("credentials.client_id", &self.client_id),
            ("credentials.client_secret", &self.client_secret),
            ("credentials.username", &self.username),
            ("credentials.password", &self.password),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(Error::missing_field(*name)),
            None => Ok(()),
        }
    }

    /// Form body for the password grant
    pub(crate) fn password_grant_form(&self) -> [(&'static str, String); 5] {
        [
            ("grant_type", "password".to_string()),
            ("client_id", self.client_id.clone()),
            ("client_secret", self.client_secret.clone()),
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ]
    }
}

// Secrets never reach the logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token plus the base URL it is valid for
#[derive(Clone)]
pub struct AccessToken {
    /// The bearer token
    pub token: String,
    /// Tenant base URL for all API calls in this run
    pub instance_url: String,
    /// Token type reported by the provider (usually "Bearer")
    pub token_type: Option<String>,
    /// When the token was obtained
    pub issued_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token issued now
    pub fn new(token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            instance_url: instance_url.into(),
            token_type: None,
            issued_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("instance_url", &self.instance_url)
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Both the token and the instance URL must be present
    pub(crate) fn into_access_token(self) -> Result<AccessToken> {
        let token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::auth(None, "token response has no access_token"))?;
        let instance_url = self
            .instance_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::auth(None, "token response has no instance_url"))?;

        Ok(AccessToken {
            token,
            instance_url,
            token_type: self.token_type,
            issued_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_credentials_validate_ok() {
        let creds = Credentials::new("id", "secret", "user@example.com", "pw");
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn test_credentials_validate_names_missing_field() {
        let creds = Credentials::new("id", "secret", "  ", "pw");
        let err = creds.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required config field: credentials.username"
        );
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials::new("id", "s3cr3t", "user", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("user"));
    }

    #[test]
    fn test_access_token_debug_redacts_token() {
        let token = AccessToken::new("00Dxx!secret", "https://acme.my.example.com");
        let debug = format!("{token:?}");
        assert!(!debug.contains("00Dxx!secret"));
        assert!(debug.contains("acme.my.example.com"));
        assert!(token.issued_at <= Utc::now());
    }

    #[test]
    fn test_token_response_requires_both_fields() {
        let ok: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "instance_url": "https://acme.example.com",
            "token_type": "Bearer"
        }))
        .unwrap();
        let token = ok.into_access_token().unwrap();
        assert_eq!(token.token, "tok");
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));

        let missing: TokenResponse =
            serde_json::from_value(serde_json::json!({"access_token": "tok"})).unwrap();
        assert!(matches!(
            missing.into_access_token(),
            Err(Error::Auth { status: None, .. })
        ));
    }
}
