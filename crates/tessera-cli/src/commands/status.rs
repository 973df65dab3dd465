//! `tessera status`: Summarize the persisted settlement state.

use super::Node;
use crate::config::NodeConfig;

pub fn run(config: &NodeConfig) -> anyhow::Result<()> {
    let node = Node::open(config)?;
    let index = node.overlay.snapshot();
    let journal = node.overlay.journal();

    println!("Settlement status:");
    println!("  Data directory:  {}", config.storage.data_dir.display());
    println!("  Open channels:   {}", index.channel_count());
    println!("  Closed channels: {}", index.closed_count());
    println!("  Claimables:      {}", index.claimable_count());
    println!("  Journal depth:   {}", journal.len());
    match journal.tip() {
        Some(tip) => println!("  Tip:             {} @ {}", tip.block_hash, tip.height),
        None => println!("  Tip:             (none)"),
    }
    println!("  State root:      {}", hex::encode(node.overlay.state_root()));
    Ok(())
}
