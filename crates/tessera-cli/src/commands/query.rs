//! `tessera channel` / `tessera claimable`: Print a single entity.

use clap::Args;
use tessera_core::{ChannelId, ClaimableId};

use super::Node;
use crate::config::NodeConfig;

#[derive(Args, Debug)]
pub struct ChannelArgs {
    /// Channel id (hex).
    pub id: ChannelId,
}

#[derive(Args, Debug)]
pub struct ClaimableArgs {
    /// Claimable balance id (hex).
    pub id: ClaimableId,
}

pub fn channel(args: &ChannelArgs, config: &NodeConfig) -> anyhow::Result<()> {
    let node = Node::open(config)?;
    if let Some(channel) = node.overlay.channel(&args.id) {
        println!("{}", serde_json::to_string_pretty(channel)?);
        return Ok(());
    }
    if node.overlay.snapshot().is_closed(&args.id) {
        println!("channel {} is closed", args.id);
        return Ok(());
    }
    anyhow::bail!("channel {} not found", args.id)
}

pub fn claimable(args: &ClaimableArgs, config: &NodeConfig) -> anyhow::Result<()> {
    let node = Node::open(config)?;
    match node.overlay.claimable(&args.id) {
        Some(balance) => {
            println!("{}", serde_json::to_string_pretty(balance)?);
            Ok(())
        }
        None => anyhow::bail!("claimable balance {} not found or already claimed", args.id),
    }
}
