//! Undo journal and the write sets produced by commit and undo.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tessera_core::{BlockHash, ChannelId, ClaimableId, Height};

use crate::types::{Channel, ClaimableBalance};

/// Minimal prior state captured for one applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UndoRecord {
    /// A channel was opened; undo removes it.
    ChannelOpened { id: ChannelId },
    /// A channel was updated; undo restores the pre-update entity.
    ChannelUpdated { prior: Channel },
    /// A channel was closed; undo restores it and drops the tombstone.
    ChannelClosed { removed: Channel },
    /// A claimable balance was created; undo removes it.
    ClaimableCreated { id: ClaimableId },
    /// A claimable balance was claimed; undo restores it.
    ClaimableClaimed { removed: ClaimableBalance },
}

impl UndoRecord {
    /// Writes that revert this record against the committed index.
    pub fn reversal(&self) -> Vec<StateWrite> {
        match self {
            Self::ChannelOpened { id } => vec![StateWrite::DeleteChannel(*id)],
            Self::ChannelUpdated { prior } => vec![StateWrite::PutChannel(prior.clone())],
            Self::ChannelClosed { removed } => vec![
                StateWrite::DeleteTombstone(removed.id),
                StateWrite::PutChannel(removed.clone()),
            ],
            Self::ClaimableCreated { id } => vec![StateWrite::DeleteClaimable(*id)],
            Self::ClaimableClaimed { removed } => {
                vec![StateWrite::PutClaimable(removed.clone())]
            }
        }
    }
}

/// Undo records of one connected block, in application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUndo {
    pub block_hash: BlockHash,
    pub height: Height,
    pub records: Vec<UndoRecord>,
}

impl BlockUndo {
    /// Storage key: big-endian height followed by the block hash, so entries
    /// iterate in height order.
    pub fn storage_key(height: Height, block_hash: &BlockHash) -> [u8; 40] {
        let mut key = [0u8; 40];
        key[..8].copy_from_slice(&height.to_be_bytes());
        key[8..].copy_from_slice(block_hash.as_bytes());
        key
    }

    pub fn key(&self) -> [u8; 40] {
        Self::storage_key(self.height, &self.block_hash)
    }
}

/// A single write against the committed index or the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "write", content = "value", rename_all = "snake_case")]
pub enum StateWrite {
    PutChannel(Channel),
    DeleteChannel(ChannelId),
    PutTombstone(ChannelId),
    DeleteTombstone(ChannelId),
    PutClaimable(ClaimableBalance),
    DeleteClaimable(ClaimableId),
    PutJournal(BlockUndo),
    DeleteJournal { height: Height, block_hash: BlockHash },
}

/// Ordered writes produced by one commit, undo or prune.
///
/// Applying the writes in order to a persisted copy of the committed index
/// reproduces the in-memory transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub writes: Vec<StateWrite>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: StateWrite) {
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateWrite> {
        self.writes.iter()
    }
}

/// Per-block undo entries, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoJournal {
    entries: VecDeque<BlockUndo>,
}

impl UndoJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a journal from persisted entries in any order.
    pub fn from_entries(entries: impl IntoIterator<Item = BlockUndo>) -> Self {
        let mut entries: Vec<BlockUndo> = entries.into_iter().collect();
        entries.sort_by_key(|e| e.key());
        Self {
            entries: entries.into(),
        }
    }

    pub fn push(&mut self, entry: BlockUndo) {
        self.entries.push_back(entry);
    }

    /// Most recently connected block still journaled.
    pub fn tip(&self) -> Option<&BlockUndo> {
        self.entries.back()
    }

    pub fn pop_tip(&mut self) -> Option<BlockUndo> {
        self.entries.pop_back()
    }

    pub fn contains(&self, block_hash: &BlockHash) -> bool {
        self.entries.iter().any(|e| &e.block_hash == block_hash)
    }

    pub fn get(&self, block_hash: &BlockHash) -> Option<&BlockUndo> {
        self.entries.iter().find(|e| &e.block_hash == block_hash)
    }

    /// Remove every entry at or below `height`, returning the removed entries.
    pub fn prune(&mut self, height: Height) -> Vec<BlockUndo> {
        let mut removed = Vec::new();
        while self.entries.front().is_some_and(|e| e.height <= height) {
            if let Some(entry) = self.entries.pop_front() {
                removed.push(entry);
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockUndo> {
        self.entries.iter()
    }
}
