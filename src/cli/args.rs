use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config;

/// veodrive - uploads finished video downloads to Google Drive
#[derive(Parser)]
#[command(name = "veodrive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the downloads folder and upload new videos (default)
    Run(RunArgs),
    /// Authorize with Google Drive ahead of time and persist the token
    Login {
        /// OAuth client configuration JSON (installed-app format)
        #[arg(long, default_value = config::DEFAULT_CLIENT_SECRET_FILE)]
        client_secret: String,

        /// Where the granted token is stored
        #[arg(long, default_value = config::DEFAULT_TOKEN_FILE)]
        token_file: String,
    },
    /// Delete the persisted Drive token
    Logout {
        /// Token file to remove
        #[arg(long, default_value = config::DEFAULT_TOKEN_FILE)]
        token_file: String,
    },
    /// Show the state of the persisted Drive token
    Status {
        /// Token file to inspect
        #[arg(long, default_value = config::DEFAULT_TOKEN_FILE)]
        token_file: String,
    },
}

/// How the uploader authenticates with Drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// Interactive user consent in the browser, refreshable token on disk
    Oauth,
    /// Non-interactive service-account key
    ServiceAccount,
}

#[derive(Args)]
pub struct RunArgs {
    /// Directory to watch (defaults to the user's Downloads folder)
    #[arg(long, env = "VEODRIVE_DOWNLOADS_DIR")]
    pub downloads_dir: Option<String>,

    /// Port for the local status endpoint
    #[arg(long, env = "VEODRIVE_STATUS_PORT", default_value_t = config::DEFAULT_STATUS_PORT)]
    pub status_port: u16,

    /// Watcher tick interval in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Delay between the two file-size samples in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_STABILITY_DELAY_MS)]
    pub stability_delay_ms: u64,

    /// Drive folder that receives uploads (created if absent)
    #[arg(long, default_value = config::DEFAULT_FOLDER_NAME)]
    pub folder_name: String,

    /// Credential source
    #[arg(long, value_enum, default_value_t = AuthMode::Oauth)]
    pub auth: AuthMode,

    /// OAuth client configuration JSON (installed-app format)
    #[arg(long, default_value = config::DEFAULT_CLIENT_SECRET_FILE)]
    pub client_secret: String,

    /// Where the granted OAuth token is stored
    #[arg(long, default_value = config::DEFAULT_TOKEN_FILE)]
    pub token_file: String,

    /// Service-account key JSON (used with --auth service-account)
    #[arg(long, default_value = config::DEFAULT_SERVICE_ACCOUNT_KEY_FILE)]
    pub service_account_key: String,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            downloads_dir: None,
            status_port: config::DEFAULT_STATUS_PORT,
            poll_interval_ms: config::DEFAULT_POLL_INTERVAL_MS,
            stability_delay_ms: config::DEFAULT_STABILITY_DELAY_MS,
            folder_name: config::DEFAULT_FOLDER_NAME.to_string(),
            auth: AuthMode::Oauth,
            client_secret: config::DEFAULT_CLIENT_SECRET_FILE.to_string(),
            token_file: config::DEFAULT_TOKEN_FILE.to_string(),
            service_account_key: config::DEFAULT_SERVICE_ACCOUNT_KEY_FILE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_cli_defaults() {
        let cli = Cli::parse_from(["veodrive", "run"]);
        let Some(Commands::Run(parsed)) = cli.command else {
            panic!("run subcommand should parse");
        };

        let defaults = RunArgs::default();
        assert_eq!(parsed.status_port, defaults.status_port);
        assert_eq!(parsed.poll_interval_ms, defaults.poll_interval_ms);
        assert_eq!(parsed.stability_delay_ms, defaults.stability_delay_ms);
        assert_eq!(parsed.folder_name, defaults.folder_name);
        assert_eq!(parsed.auth, defaults.auth);
        assert_eq!(parsed.client_secret, defaults.client_secret);
        assert_eq!(parsed.token_file, defaults.token_file);
        assert_eq!(parsed.service_account_key, defaults.service_account_key);
    }

    #[test]
    fn test_login_defaults() {
        let cli = Cli::parse_from(["veodrive", "login"]);
        match cli.command {
            Some(Commands::Login {
                client_secret,
                token_file,
            }) => {
                assert_eq!(client_secret, config::DEFAULT_CLIENT_SECRET_FILE);
                assert_eq!(token_file, config::DEFAULT_TOKEN_FILE);
            }
            _ => panic!("login subcommand should parse"),
        }
    }

    #[test]
    fn test_service_account_mode_parses() {
        let cli = Cli::parse_from([
            "veodrive",
            "run",
            "--auth",
            "service-account",
            "--service-account-key",
            "keys/sa.json",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("run subcommand should parse");
        };
        assert_eq!(args.auth, AuthMode::ServiceAccount);
        assert_eq!(args.service_account_key, "keys/sa.json");
    }
}
