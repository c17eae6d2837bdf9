//! Main entry point for the Alerta notification service CLI.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::service::Config;
use std::error::Error;
use std::path::PathBuf;

/// Main CLI structure for the Alerta notifier
#[derive(Parser)]
#[command(name = "alerta-notifier")]
#[command(about = "Realtime notification backend for the Alerta incident platform", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for the notifier CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Start the notification service
    Serve {
        /// The port number to bind the server to (e.g., 8080)
        #[arg(
            long,
            short,
            help = "The port number to bind the server to (e.g., 8080). Example usage: `--port 8080`"
        )]
        port: u16,

        /// Path to the configuration file (optional)
        #[arg(
            long,
            short,
            help = "Path to the configuration file (e.g., alerta.yaml or alerta.json). If not provided, defaults will be used."
        )]
        config: Option<PathBuf>,
    },
}

/// Initializes environment variables and returns the parsed CLI.
#[must_use]
pub fn initialize_cli() -> Cli {
    dotenv().ok();
    Cli::parse()
}

/// Handles the serve command by loading configuration and starting the server.
///
/// # Errors
/// Returns an error if configuration loading or server startup fails.
pub async fn handle_serve_command(
    port: u16,
    config: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let resolved_config = Config::load_config(config, Some(port))?;
    notifier::server::run(resolved_config).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = initialize_cli();

    match cli.command {
        Commands::Serve { port, config } => {
            handle_serve_command(port, config).await?;
        }
    }

    Ok(())
}
