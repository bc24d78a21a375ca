//! haibara - command-line client for the haibara blog admin API.
//!
//! Logs in against the blog backend, keeps the issued token in the durable or
//! session tier, and runs permission-checked data exports.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use haibara_core::{AppContext, Config};

/// Log file prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "haibara.log";

#[derive(Parser)]
#[command(name = "haibara")]
#[command(about = "Command-line client for the haibara blog admin API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides config and HAIBARA_BASE_API)
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the issued token
    Login {
        username: String,

        /// Keep the token across restarts
        #[arg(long, short = 'r')]
        remember: bool,
    },
    /// Log out and remove the stored token
    Logout,
    /// Show whether a token is stored and when it expires
    Status,
    /// Show the logged-in account
    Whoami,
    /// Data export
    Export {
        #[command(subcommand)]
        cmd: ExportCommands,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// List business types the backend can export
    Types,
    /// List formats supported for a business type
    Formats { business: String },
    /// Export a business type to a file
    Run {
        business: String,
        format: String,

        /// File name to request (defaults to "<name>_<timestamp>")
        #[arg(long)]
        file_name: Option<String>,

        /// Directory to write the file to
        #[arg(long, short = 'o', default_value = ".")]
        out: std::path::PathBuf,

        /// Skip the permission and format checks
        #[arg(long)]
        direct: bool,

        /// Replace a file of the same name in the output directory
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Print the direct download URL for an export
    Url {
        business: String,
        format: String,

        #[arg(long)]
        file_name: Option<String>,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }

    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(base_url = %config.base_url, "haibara starting");

    let ctx = AppContext::from_config(config)?;

    match cli.command {
        Commands::Login { username, remember } => commands::login(&ctx, &username, remember).await,
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Status => commands::status(&ctx),
        Commands::Whoami => commands::whoami(&ctx).await,
        Commands::Export { cmd } => match cmd {
            ExportCommands::Types => commands::export_types(&ctx).await,
            ExportCommands::Formats { business } => commands::export_formats(&ctx, &business).await,
            ExportCommands::Run {
                business,
                format,
                file_name,
                out,
                direct,
                force,
            } => {
                commands::export_run(&ctx, &business, &format, file_name.as_deref(), &out, direct, force).await
            }
            ExportCommands::Url {
                business,
                format,
                file_name,
            } => commands::export_url(&ctx, &business, &format, file_name.as_deref()),
        },
    }
}
