pub mod block;
pub mod init;
pub mod query;
pub mod status;

use anyhow::Context;
use tessera_settlement::SettlementOverlay;
use tessera_store::Store;

use crate::config::NodeConfig;

/// Persistent store together with the overlay rebuilt from it.
pub struct Node {
    pub store: Store,
    pub overlay: SettlementOverlay,
}

impl Node {
    pub fn open(config: &NodeConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.storage.data_dir).with_context(|| {
            format!("opening store at {}", config.storage.data_dir.display())
        })?;
        let (index, journal) = store.load()?;
        let overlay = SettlementOverlay::from_parts(config.settlement.clone(), index, journal);
        Ok(Self { store, overlay })
    }
}
