//! Credential acquisition for the Drive API.
//!
//! Two interchangeable strategies: a browser consent flow against a user's
//! own Drive, or a headless service account. The worker only ever asks for
//! a bearer token and does not care which one is behind it.

pub mod loopback;
pub mod oauth;
pub mod service_account;
pub mod store;

use anyhow::Context;
use thiserror::Error;

use crate::config::AuthConfig;

pub use oauth::OAuthTokenManager;
pub use service_account::ServiceAccountAuth;
pub use store::{StoreError, StoredCredential, TokenStore};

/// The only scope we ask for. `drive.file` limits access to files this
/// application created.
pub const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Tokens are treated as expired this many seconds early so an upload never
/// starts with a token about to lapse.
pub(crate) const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("invalid client configuration: {0}")]
    ClientConfig(String),
    #[error("token refresh rejected (HTTP {status}): {body}")]
    RefreshRejected { status: u16, body: String },
    #[error("token request failed (HTTP {status}): {body}")]
    Exchange { status: u16, body: String },
    #[error("consent listener: {0}")]
    Listener(String),
    #[error("token assertion: {0}")]
    Assertion(#[from] jsonwebtoken::errors::Error),
    #[error("token endpoint transport: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The configured way of obtaining bearer tokens.
pub enum AuthStrategy {
    OAuthUser(OAuthTokenManager),
    ServiceAccount(ServiceAccountAuth),
}

impl AuthStrategy {
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        match config {
            AuthConfig::OAuthUser {
                client_secret,
                token_file,
            } => {
                let store = TokenStore::new(token_file.clone());
                let manager = OAuthTokenManager::new(client_secret, store).with_context(|| {
                    format!(
                        "loading OAuth client config from {}",
                        client_secret.display()
                    )
                })?;
                Ok(Self::OAuthUser(manager))
            }
            AuthConfig::ServiceAccount { key_file } => {
                let auth = ServiceAccountAuth::new(key_file).with_context(|| {
                    format!("loading service account key from {}", key_file.display())
                })?;
                Ok(Self::ServiceAccount(auth))
            }
        }
    }

    pub async fn valid_credential(&mut self) -> Result<String, AuthFlowError> {
        match self {
            Self::OAuthUser(manager) => manager.valid_credential().await,
            Self::ServiceAccount(auth) => auth.valid_credential().await,
        }
    }

    pub fn invalidate(&mut self) {
        match self {
            Self::OAuthUser(manager) => manager.invalidate(),
            Self::ServiceAccount(auth) => auth.invalidate(),
        }
    }
}
