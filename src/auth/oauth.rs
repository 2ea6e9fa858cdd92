//! Browser consent flow and token refresh for a user-owned Drive.
//!
//! The manager is a small state machine. With no stored token it runs the
//! consent flow on first use; with a stored token it refreshes when the
//! access token is about to expire. A rejected refresh drops the manager
//! back to the consent-required state instead of retrying forever.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

use super::loopback;
use super::store::{StoredCredential, TokenStore};
use super::{AuthFlowError, EXPIRY_MARGIN_SECS, OAUTH_SCOPE};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_CALLBACK_PATH: &str = "/oauth2callback";
const HTTP_TIMEOUT_SECS: u64 = 30;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth client registration, as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientConfig>,
    web: Option<ClientConfig>,
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, AuthFlowError> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            AuthFlowError::ClientConfig(format!("cannot read {}: {err}", path.display()))
        })?;
        let file: ClientSecretFile = serde_json::from_str(&content).map_err(|err| {
            AuthFlowError::ClientConfig(format!("cannot parse {}: {err}", path.display()))
        })?;
        file.installed.or(file.web).ok_or_else(|| {
            AuthFlowError::ClientConfig(format!(
                "{} has neither an \"installed\" nor a \"web\" section",
                path.display()
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Google omits `refresh_token` on refresh responses; keep the one we
    /// already hold in that case.
    fn into_credential(self, previous: Option<&StoredCredential>) -> StoredCredential {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous.and_then(|c| c.refresh_token.clone()));
        let scopes = match self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => previous
                .map(|c| c.scopes.clone())
                .unwrap_or_else(|| vec![OAUTH_SCOPE.to_string()]),
        };
        StoredCredential {
            access_token: self.access_token,
            refresh_token,
            expiry: Utc::now() + chrono::Duration::seconds(self.expires_in),
            scopes,
        }
    }
}

enum TokenState {
    NoToken,
    AwaitingConsent,
    Authorized(StoredCredential),
}

pub struct OAuthTokenManager {
    config: ClientConfig,
    store: TokenStore,
    http: reqwest::Client,
    state: TokenState,
}

impl OAuthTokenManager {
    pub fn new(client_secret: &Path, store: TokenStore) -> Result<Self, AuthFlowError> {
        let config = ClientConfig::load(client_secret)?;
        let state = match store.load() {
            Ok(Some(credential)) => TokenState::Authorized(credential),
            Ok(None) => TokenState::NoToken,
            Err(err) => {
                warn!(
                    "ignoring unreadable token file {}: {err}",
                    store.path().display()
                );
                TokenState::NoToken
            }
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Ok(Self {
            config,
            store,
            http,
            state,
        })
    }

    /// Return a usable access token, refreshing or running the consent flow
    /// as the current state requires. Blocks on the browser when consent is
    /// needed.
    pub async fn valid_credential(&mut self) -> Result<String, AuthFlowError> {
        let margin = chrono::Duration::seconds(EXPIRY_MARGIN_SECS);
        match &self.state {
            TokenState::Authorized(credential) if !credential.is_expired(margin) => {
                Ok(credential.access_token.clone())
            }
            TokenState::Authorized(credential) => match credential.refresh_token.clone() {
                Some(refresh_token) => self.refresh(&refresh_token).await,
                None => {
                    warn!("access token expired and no refresh token was granted");
                    self.state = TokenState::AwaitingConsent;
                    self.run_consent().await
                }
            },
            TokenState::NoToken | TokenState::AwaitingConsent => self.run_consent().await,
        }
    }

    /// Mark the current access token stale so the next use refreshes it.
    pub fn invalidate(&mut self) {
        if let TokenState::Authorized(credential) = &mut self.state {
            credential.expiry = Utc::now() - chrono::Duration::seconds(1);
            debug!("access token marked stale");
        }
    }

    /// Run the consent flow unconditionally, replacing any stored token.
    pub async fn interactive_consent(&mut self) -> Result<(), AuthFlowError> {
        self.run_consent().await.map(|_| ())
    }

    async fn refresh(&mut self, refresh_token: &str) -> Result<String, AuthFlowError> {
        debug!("refreshing the access token");
        let response = self
            .http
            .post(&self.config.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("token refresh was rejected (HTTP {status}); consent is required again");
            self.state = TokenState::AwaitingConsent;
            return Err(AuthFlowError::RefreshRejected { status, body });
        }

        let granted: TokenResponse = response.json().await?;
        let previous = match &self.state {
            TokenState::Authorized(credential) => Some(credential),
            _ => None,
        };
        let credential = granted.into_credential(previous);
        if let Err(err) = self.store.save(&credential) {
            warn!(
                "could not persist the refreshed token to {}: {err}",
                self.store.path().display()
            );
        }
        let token = credential.access_token.clone();
        self.state = TokenState::Authorized(credential);
        Ok(token)
    }

    async fn run_consent(&mut self) -> Result<String, AuthFlowError> {
        info!("🔐 Drive authorization required, starting the consent flow");

        let (host, port, path) = redirect_parts(&self.config);
        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|err| {
                AuthFlowError::Listener(format!("cannot bind {host}:{port}: {err}"))
            })?;
        let local_port = listener
            .local_addr()
            .map_err(|err| AuthFlowError::Listener(err.to_string()))?
            .port();
        let redirect_uri = format!("http://{host}:{local_port}{path}");

        let (verifier, challenge) = pkce_pair();
        let url = authorize_url(&self.config, &redirect_uri, &challenge)?;

        println!("🌐 Open this URL in your browser to authorize Drive access:");
        println!("{url}");
        if let Err(err) = open::that(url.as_str()) {
            debug!("could not open a browser automatically: {err}");
        }

        let code = loopback::capture_code(listener, &path)
            .await
            .map_err(|err| AuthFlowError::Listener(err.to_string()))?;
        let credential = self.exchange_code(&code, &redirect_uri, &verifier).await?;

        if let Err(err) = self.store.save(&credential) {
            warn!(
                "could not persist the token to {}: {err}",
                self.store.path().display()
            );
        }
        let token = credential.access_token.clone();
        info!("✅ Drive authorization complete");
        self.state = TokenState::Authorized(credential);
        Ok(token)
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: &str,
    ) -> Result<StoredCredential, AuthFlowError> {
        let response = self
            .http
            .post(&self.config.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code_verifier", verifier),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthFlowError::Exchange { status, body });
        }

        let granted: TokenResponse = response.json().await?;
        Ok(granted.into_credential(None))
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE verifier and its S256 challenge.
fn pkce_pair() -> (String, String) {
    let verifier = random_urlsafe(32);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

fn authorize_url(
    config: &ClientConfig,
    redirect_uri: &str,
    challenge: &str,
) -> Result<Url, AuthFlowError> {
    let mut url = Url::parse(&config.auth_uri)
        .map_err(|err| AuthFlowError::ClientConfig(format!("bad auth_uri: {err}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", OAUTH_SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url)
}

/// Host, port and path to serve the callback on. Port 0 means pick an
/// ephemeral port, which Google permits for installed-app loopback
/// redirects.
fn redirect_parts(config: &ClientConfig) -> (String, u16, String) {
    let parsed = config
        .redirect_uris
        .first()
        .and_then(|uri| Url::parse(uri).ok());
    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or("localhost")
        .to_string();
    let port = parsed.as_ref().and_then(|u| u.port()).unwrap_or(0);
    let path = match parsed.as_ref().map(|u| u.path()) {
        None | Some("") | Some("/") => DEFAULT_CALLBACK_PATH.to_string(),
        Some(p) => p.to_string(),
    };
    (host, port, path)
}
