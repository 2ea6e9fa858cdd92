//! Service configuration resolved from CLI arguments.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::cli::args::{AuthMode, RunArgs};
use crate::cli::paths;

/// Port for the local status endpoint.
pub const DEFAULT_STATUS_PORT: u16 = 8888;

/// Watcher tick interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Delay between the two size samples of the stability check, in milliseconds.
pub const DEFAULT_STABILITY_DELAY_MS: u64 = 500;

/// Remote folder that receives uploads.
pub const DEFAULT_FOLDER_NAME: &str = "Veo_Uploads";

/// OAuth client configuration shipped next to the binary.
pub const DEFAULT_CLIENT_SECRET_FILE: &str = "res/oauth_credentials.json";

/// Where the granted OAuth token is persisted.
pub const DEFAULT_TOKEN_FILE: &str = "res/token.json";

/// Service-account key used with `--auth service-account`.
pub const DEFAULT_SERVICE_ACCOUNT_KEY_FILE: &str = "res/drive_api_key.json";

/// Resolved settings for one service run.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory watched for new video files.
    pub downloads_dir: PathBuf,
    /// Port the status endpoint listens on.
    pub status_port: u16,
    /// Watcher tick interval.
    pub poll_interval: Duration,
    /// Delay between stability size samples.
    pub stability_delay: Duration,
    /// Name of the remote folder receiving uploads.
    pub folder_name: String,
    /// How credentials are obtained.
    pub auth: AuthConfig,
}

/// Credential source selected at startup.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    /// Interactive consent in the browser, token persisted across runs.
    OAuthUser {
        client_secret: PathBuf,
        token_file: PathBuf,
    },
    /// Non-interactive JWT grant from a service-account key file.
    ServiceAccount { key_file: PathBuf },
}

impl ServiceConfig {
    /// Build a config from parsed CLI arguments, filling in platform defaults.
    pub fn from_run_args(args: &RunArgs) -> Result<Self> {
        let downloads_dir = paths::resolve_downloads_dir(args.downloads_dir.clone())?;

        let auth = match args.auth {
            AuthMode::Oauth => AuthConfig::OAuthUser {
                client_secret: PathBuf::from(&args.client_secret),
                token_file: PathBuf::from(&args.token_file),
            },
            AuthMode::ServiceAccount => AuthConfig::ServiceAccount {
                key_file: PathBuf::from(&args.service_account_key),
            },
        };

        Ok(Self {
            downloads_dir,
            status_port: args.status_port,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            stability_delay: Duration::from_millis(args.stability_delay_ms),
            folder_name: args.folder_name.clone(),
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_defaults_from_args() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let harness = Harness::parse_from(["veodrive", "--downloads-dir", &dir]);

        let config = ServiceConfig::from_run_args(&harness.run).unwrap();
        assert_eq!(config.status_port, DEFAULT_STATUS_PORT);
        assert_eq!(
            config.poll_interval,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        assert_eq!(
            config.stability_delay,
            Duration::from_millis(DEFAULT_STABILITY_DELAY_MS)
        );
        assert_eq!(config.folder_name, DEFAULT_FOLDER_NAME);
        assert!(matches!(config.auth, AuthConfig::OAuthUser { .. }));
    }

    #[test]
    fn test_service_account_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        let harness = Harness::parse_from([
            "veodrive",
            "--downloads-dir",
            &dir,
            "--auth",
            "service-account",
            "--service-account-key",
            "keys/sa.json",
        ]);

        let config = ServiceConfig::from_run_args(&harness.run).unwrap();
        match config.auth {
            AuthConfig::ServiceAccount { key_file } => {
                assert_eq!(key_file, PathBuf::from("keys/sa.json"));
            }
            other => panic!("expected service-account auth, got {:?}", other),
        }
    }
}
