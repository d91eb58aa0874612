//! Koppeling - Recras to Exact Online invoice synchronization
//!
//! Main entry point for the `koppeling` command-line tool.

mod commands;
mod context;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use koppeling_domain::Config;
use tracing::{error, info};

use crate::context::AppContext;

#[derive(Parser, Debug)]
#[command(name = "koppeling")]
#[command(about = "Synchronize Recras invoices into Exact Online")]
#[command(version)]
struct Cli {
    /// Configuration file; environment variables are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daily scheduler until Ctrl-C
    Run,

    /// Run one synchronization pass
    Sync {
        /// Only synchronize this Recras hostname
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Show the Exact Online configuration status per company
    Status {
        #[arg(long)]
        tenant: String,
    },

    /// Manage tenant credentials
    #[command(subcommand)]
    Credentials(CredentialCommands),
}

#[derive(Subcommand, Debug)]
enum CredentialCommands {
    /// Validate and store Recras credentials
    Add {
        #[arg(long)]
        hostname: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Invoices dated before this day (YYYY-MM-DD) are never synchronized
        #[arg(long)]
        start_sync: NaiveDate,
    },

    /// Store the Exact Online refresh token of a tenant
    Link {
        #[arg(long)]
        hostname: String,
        #[arg(long)]
        refresh_token: String,
    },

    /// List stored tenants
    List,
}

fn load_config(path: Option<PathBuf>) -> koppeling_domain::Result<Config> {
    match path {
        Some(path) => koppeling_infra::config::load_from_file(Some(path)),
        None => koppeling_infra::config::load(),
    }
}

async fn dispatch(ctx: &AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run => commands::run_daemon(ctx).await,
        Commands::Sync { tenant } => commands::sync_once(ctx, tenant.as_deref()).await,
        Commands::Status { tenant } => commands::status(ctx, &tenant).await,
        Commands::Credentials(CredentialCommands::Add {
            hostname,
            username,
            password,
            start_sync,
        }) => commands::add_credentials(ctx, &hostname, &username, &password, start_sync).await,
        Commands::Credentials(CredentialCommands::Link { hostname, refresh_token }) => {
            commands::link(ctx, &hostname, &refresh_token).await
        }
        Commands::Credentials(CredentialCommands::List) => commands::list(ctx).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env before the configuration reads the environment
    let dotenv = dotenvy::dotenv();

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(err) => {
            logging::init(&koppeling_domain::LoggingConfig::default());
            error!(error = %err, "Could not load configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(err) => tracing::debug!(error = %err, "No .env file loaded"),
    }

    let ctx = match AppContext::new(config) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!(error = %err, "Could not open the credential store");
            return ExitCode::FAILURE;
        }
    };

    match dispatch(&ctx, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = format!("{err:#}");
            error!(error = %message, "Command failed");
            ExitCode::FAILURE
        }
    }
}
