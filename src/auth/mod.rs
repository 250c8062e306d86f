//! Authentication module
//!
//! Exchanges configured credentials for a short-lived bearer token and the
//! tenant base URL. The token is acquired once per run; expiry is not tracked.

mod provider;
mod types;

pub use provider::{CredentialProvider, PasswordGrantProvider, DEFAULT_LOGIN_URL};
pub use types::{AccessToken, Credentials};
