//! Tierwise CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP diagnostic gateway
//! - `bank validate`: Check an item bank file
//! - `simulate`: Run a diagnostic against a simulated student
//! - `config`: Show, locate or validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tierwise",
    about = "Tierwise — adaptive placement diagnostics",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.tierwise/config.toml
    #[arg(long, global = true, env = "TIERWISE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the item bank path
        #[arg(long)]
        bank: Option<PathBuf>,
    },

    /// Item bank tools
    Bank {
        #[command(subcommand)]
        action: BankAction,
    },

    /// Run a diagnostic against a simulated student of known ability
    Simulate {
        /// True ability of the simulated student
        #[arg(long, allow_hyphen_values = true)]
        theta: f64,

        /// Override the item bank path
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of items administered
        #[arg(long)]
        items: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BankAction {
    /// Load and validate an item bank file
    Validate {
        /// Path to a JSON item bank
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print a default config file
    Default,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port, host, bank } => commands::serve::run(config_path, port, host, bank).await?,
        Commands::Bank { action } => match action {
            BankAction::Validate { path } => commands::bank::validate(&path).await?,
        },
        Commands::Simulate {
            theta,
            bank,
            seed,
            items,
            json,
        } => {
            let options = commands::simulate::SimulateOptions {
                theta,
                bank,
                seed,
                items,
                json,
            };
            commands::simulate::run(config_path, options).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
            ConfigAction::Default => commands::config_cmd::default().await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
        },
    }

    Ok(())
}
