use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use runtime::{AppConfig, LoggingOptions};

mod request_id;
mod server;
mod web;

/// BTC price streaming service.
#[derive(Parser)]
#[command(name = "btc-stream-server")]
#[command(about = "Streams the latest BTC price to SSE clients")]
#[command(version)]
struct Cli {
    /// Path to an env-format configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // fall back to a ./.env file when no config path was given
    let env_file = cli
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(".env")).filter(|p| p.exists()));

    let mut config = AppConfig::load(env_file.as_deref())?;

    // CLI overrides
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    runtime::logging::init_logging(&LoggingOptions {
        service_name: config.service_name.clone(),
        environment: config.environment.clone(),
        verbosity: cli.verbose,
    });

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => server::run(config).await,
        Commands::Check => {
            tracing::info!("configuration is valid");
            println!("configuration check passed");
            println!("{config}");
            Ok(())
        }
    }
}
