use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod auth;
mod cli;
mod command;
mod config;
mod drive;
mod error;
mod pipeline;
mod service;
mod web;

use cli::args::{Cli, Commands, RunArgs};
use command::{run_login, run_logout, run_status};
use config::ServiceConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // A bare invocation behaves like `veodrive run` with defaults.
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Run(RunArgs::default()));

    match command {
        Commands::Run(args) => {
            let config = ServiceConfig::from_run_args(&args)?;
            service::run(config).await?;
        }
        Commands::Login {
            client_secret,
            token_file,
        } => {
            run_login(client_secret, token_file).await?;
        }
        Commands::Logout { token_file } => {
            run_logout(token_file).await?;
        }
        Commands::Status { token_file } => {
            run_status(token_file).await?;
        }
    }

    Ok(())
}
