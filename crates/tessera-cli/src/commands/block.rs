//! `tessera connect` / `disconnect` / `prune`: Drive blocks through the overlay.

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tessera_core::{BlockHash, Height, Transaction};

use super::Node;
use crate::config::NodeConfig;

/// A block as read from disk: header identity plus its transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockFile {
    pub hash: BlockHash,
    pub height: Height,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl BlockFile {
    pub fn read(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading block file {}", path.display()))?;
        let block = serde_json::from_str(&contents)
            .with_context(|| format!("parsing block file {}", path.display()))?;
        Ok(block)
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Path to a JSON block file.
    pub block: PathBuf,
}

#[derive(Args, Debug)]
pub struct DisconnectArgs {
    /// Hash of the block to disconnect (must be the journal tip).
    pub hash: BlockHash,
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Current chain tip height.
    #[arg(long)]
    pub tip: Height,
}

pub fn connect(args: &ConnectArgs, config: &NodeConfig) -> anyhow::Result<()> {
    let block = BlockFile::read(&args.block)?;
    let mut node = Node::open(config)?;

    let mut changes = node
        .overlay
        .connect_block(block.hash, block.height, &block.transactions)
        .with_context(|| format!("block {} at height {} rejected", block.hash, block.height))?;
    let pruned = node.overlay.prune_journal(block.height);
    let pruned_count = pruned.len();
    changes.writes.extend(pruned.writes);
    node.store.apply(&changes)?;

    println!("Connected block {} at height {}", block.hash, block.height);
    println!("  Transactions:   {}", block.transactions.len());
    println!("  Writes:         {}", changes.len());
    println!("  Pruned entries: {}", pruned_count);
    println!("  State root:     {}", hex::encode(node.overlay.state_root()));
    Ok(())
}

pub fn disconnect(args: &DisconnectArgs, config: &NodeConfig) -> anyhow::Result<()> {
    let mut node = Node::open(config)?;
    let changes = node
        .overlay
        .disconnect_block(&args.hash)
        .with_context(|| format!("disconnecting block {}", args.hash))?;
    node.store.apply(&changes)?;

    println!("Disconnected block {}", args.hash);
    println!("  State root: {}", hex::encode(node.overlay.state_root()));
    Ok(())
}

pub fn prune(args: &PruneArgs, config: &NodeConfig) -> anyhow::Result<()> {
    let mut node = Node::open(config)?;
    let changes = node.overlay.prune_journal(args.tip);
    node.store.apply(&changes)?;
    println!(
        "Pruned {} journal entries ({} remain)",
        changes.len(),
        node.overlay.journal().len()
    );
    Ok(())
}
