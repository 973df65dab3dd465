//! Tessera CLI: operator interface to the settlement layer.
//!
//! Subcommands: init, status, channel, claimable, connect, disconnect, prune.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::NodeConfig;

/// Tessera: payment channels and claimable balances over a UTXO ledger.
#[derive(Parser, Debug)]
#[command(name = "tessera", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, default_value = "tessera.toml")]
    config: PathBuf,

    /// Override the data directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file.
    Init(commands::init::InitArgs),
    /// Print index counts, journal depth and the state root.
    Status,
    /// Print a channel as JSON.
    Channel(commands::query::ChannelArgs),
    /// Print a claimable balance as JSON.
    Claimable(commands::query::ClaimableArgs),
    /// Connect a block read from a JSON file.
    Connect(commands::block::ConnectArgs),
    /// Disconnect the most recently connected block.
    Disconnect(commands::block::DisconnectArgs),
    /// Prune undo journal entries below the retention window.
    Prune(commands::block::PruneArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::load(&cli.config)?;
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json_logs() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match &cli.command {
        Commands::Init(args) => commands::init::run(args, &cli.config, &config),
        Commands::Status => commands::status::run(&config),
        Commands::Channel(args) => commands::query::channel(args, &config),
        Commands::Claimable(args) => commands::query::claimable(args, &config),
        Commands::Connect(args) => commands::block::connect(args, &config),
        Commands::Disconnect(args) => commands::block::disconnect(args, &config),
        Commands::Prune(args) => commands::block::prune(args, &config),
    }
}
