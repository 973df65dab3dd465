//! RocksDB storage backend for the settlement overlay.
//!
//! The committed index and the undo journal are persisted as JSON values in
//! one column family per kind. Every commit, undo or prune arrives as a
//! [`ChangeSet`] and is written atomically in a single batch.

use anyhow::{Context, Result};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use std::path::Path;

use tessera_core::{ChannelId, ClaimableId};
use tessera_settlement::{
    BlockUndo, ChangeSet, Channel, ClaimableBalance, SettlementIndex, StateWrite, UndoJournal,
};

/// Column family names.
pub const CF_CHANNELS: &str = "channels";
pub const CF_CLAIMABLES: &str = "claimables";
pub const CF_CLOSED_CHANNELS: &str = "closed_channels";
pub const CF_UNDO_JOURNAL: &str = "undo_journal";
pub const CF_META: &str = "meta";

const META_SCHEMA_VERSION: &[u8] = b"schema_version";
const SCHEMA_VERSION: u32 = 1;

/// RocksDB-backed settlement store.
pub struct Store {
    db: DB,
}

impl Store {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating data directory {}", path.display()))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_CHANNELS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CLAIMABLES, Options::default()),
            ColumnFamilyDescriptor::new(CF_CLOSED_CHANNELS, Options::default()),
            ColumnFamilyDescriptor::new(CF_UNDO_JOURNAL, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        let store = Self { db };
        store.check_schema()?;
        tracing::debug!(path = %path.display(), "Opened settlement store");
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", name))
    }

    fn check_schema(&self) -> Result<()> {
        let meta = self.cf(CF_META)?;
        match self.db.get_cf(meta, META_SCHEMA_VERSION)? {
            Some(raw) => {
                let version: u32 = serde_json::from_slice(&raw)?;
                if version != SCHEMA_VERSION {
                    anyhow::bail!(
                        "unsupported store schema version {} (expected {})",
                        version,
                        SCHEMA_VERSION
                    );
                }
            }
            None => {
                self.db
                    .put_cf(meta, META_SCHEMA_VERSION, serde_json::to_vec(&SCHEMA_VERSION)?)?;
            }
        }
        Ok(())
    }

    /// Persist a change set atomically.
    pub fn apply(&self, changes: &ChangeSet) -> Result<()> {
        let channels = self.cf(CF_CHANNELS)?;
        let claimables = self.cf(CF_CLAIMABLES)?;
        let closed = self.cf(CF_CLOSED_CHANNELS)?;
        let journal = self.cf(CF_UNDO_JOURNAL)?;

        let mut batch = WriteBatch::default();
        for write in changes.iter() {
            match write {
                StateWrite::PutChannel(channel) => {
                    batch.put_cf(channels, channel.id.as_bytes(), serde_json::to_vec(channel)?)
                }
                StateWrite::DeleteChannel(id) => batch.delete_cf(channels, id.as_bytes()),
                StateWrite::PutTombstone(id) => batch.put_cf(closed, id.as_bytes(), b""),
                StateWrite::DeleteTombstone(id) => batch.delete_cf(closed, id.as_bytes()),
                StateWrite::PutClaimable(balance) => {
                    batch.put_cf(claimables, balance.id.as_bytes(), serde_json::to_vec(balance)?)
                }
                StateWrite::DeleteClaimable(id) => batch.delete_cf(claimables, id.as_bytes()),
                StateWrite::PutJournal(entry) => {
                    batch.put_cf(journal, entry.key(), serde_json::to_vec(entry)?)
                }
                StateWrite::DeleteJournal { height, block_hash } => {
                    batch.delete_cf(journal, BlockUndo::storage_key(*height, block_hash))
                }
            }
        }
        self.db.write(batch)?;
        tracing::debug!(writes = changes.len(), "Persisted settlement change set");
        Ok(())
    }

    /// Load the committed index and undo journal.
    pub fn load(&self) -> Result<(SettlementIndex, UndoJournal)> {
        let channels: Vec<Channel> = self.values(CF_CHANNELS)?;
        let claimables: Vec<ClaimableBalance> = self.values(CF_CLAIMABLES)?;
        let closed = self
            .keys(CF_CLOSED_CHANNELS)?
            .iter()
            .map(|key| ChannelId::from_slice(key).map_err(anyhow::Error::from))
            .collect::<Result<Vec<_>>>()?;
        let entries: Vec<BlockUndo> = self.values(CF_UNDO_JOURNAL)?;

        tracing::info!(
            channels = channels.len(),
            claimables = claimables.len(),
            closed = closed.len(),
            journal = entries.len(),
            "Loaded settlement state"
        );
        Ok((
            SettlementIndex::from_entries(channels, claimables, closed),
            UndoJournal::from_entries(entries),
        ))
    }

    /// Read a single channel.
    pub fn get_channel(&self, id: &ChannelId) -> Result<Option<Channel>> {
        self.get(CF_CHANNELS, id.as_bytes())
    }

    /// Read a single claimable balance.
    pub fn get_claimable(&self, id: &ClaimableId) -> Result<Option<ClaimableBalance>> {
        self.get(CF_CLAIMABLES, id.as_bytes())
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw).with_context(|| {
                format!("decoding {} entry", cf_name)
            })?)),
            None => Ok(None),
        }
    }

    fn values<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            out.push(
                serde_json::from_slice(&value)
                    .with_context(|| format!("decoding {} entry", cf_name))?,
            );
        }
        Ok(out)
    }

    fn keys(&self, cf_name: &str) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            out.push(key);
        }
        Ok(out)
    }
}
