//! `tessera init`: Write a default configuration file.

use clap::Args;
use std::path::Path;

use crate::config::NodeConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, path: &Path, config: &NodeConfig) -> anyhow::Result<()> {
    if path.exists() && !args.force {
        anyhow::bail!("configuration file already exists at {}", path.display());
    }

    let fresh = NodeConfig {
        storage: config.storage.clone(),
        ..NodeConfig::default()
    };
    fresh.save(path)?;
    std::fs::create_dir_all(&fresh.storage.data_dir)?;

    tracing::info!(path = %path.display(), "wrote default config");
    println!("Initialized Tessera node at {}", path.display());
    println!("  Data directory: {}", fresh.storage.data_dir.display());
    Ok(())
}
