//! Committed settlement index and block-scoped staging.

use std::collections::{BTreeMap, BTreeSet};

use tessera_core::{BlockHash, ChannelId, ClaimableId, Height};
use tessera_crypto::{blake3_hash, merkle_root, Hash};

use crate::journal::{StateWrite, UndoRecord};
use crate::types::{Channel, ClaimableBalance};

/// Finalized channels, claimable balances and closed-channel tombstones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementIndex {
    channels: BTreeMap<ChannelId, Channel>,
    claimables: BTreeMap<ClaimableId, ClaimableBalance>,
    closed_channels: BTreeSet<ChannelId>,
}

impl SettlementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from persisted entries.
    pub fn from_entries(
        channels: impl IntoIterator<Item = Channel>,
        claimables: impl IntoIterator<Item = ClaimableBalance>,
        closed_channels: impl IntoIterator<Item = ChannelId>,
    ) -> Self {
        Self {
            channels: channels.into_iter().map(|c| (c.id, c)).collect(),
            claimables: claimables.into_iter().map(|b| (b.id, b)).collect(),
            closed_channels: closed_channels.into_iter().collect(),
        }
    }

    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn claimable(&self, id: &ClaimableId) -> Option<&ClaimableBalance> {
        self.claimables.get(id)
    }

    pub fn is_closed(&self, id: &ChannelId) -> bool {
        self.closed_channels.contains(id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn claimables(&self) -> impl Iterator<Item = &ClaimableBalance> {
        self.claimables.values()
    }

    pub fn closed_channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.closed_channels.iter()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn claimable_count(&self) -> usize {
        self.claimables.len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed_channels.len()
    }

    /// Apply one write. Journal writes are ignored here; the overlay keeps
    /// the journal separately.
    pub fn apply(&mut self, write: &StateWrite) {
        match write {
            StateWrite::PutChannel(channel) => {
                self.channels.insert(channel.id, channel.clone());
            }
            StateWrite::DeleteChannel(id) => {
                self.channels.remove(id);
            }
            StateWrite::PutTombstone(id) => {
                self.closed_channels.insert(*id);
            }
            StateWrite::DeleteTombstone(id) => {
                self.closed_channels.remove(id);
            }
            StateWrite::PutClaimable(balance) => {
                self.claimables.insert(balance.id, balance.clone());
            }
            StateWrite::DeleteClaimable(id) => {
                self.claimables.remove(id);
            }
            StateWrite::PutJournal(_) | StateWrite::DeleteJournal { .. } => {}
        }
    }

    /// BLAKE3 Merkle root over live channels, live claimable balances and
    /// tombstones, each in id order. The empty index has an all-zero root.
    pub fn state_root(&self) -> Hash {
        let mut leaves: Vec<Hash> =
            Vec::with_capacity(self.channels.len() + self.claimables.len() + self.closed_channels.len());
        leaves.extend(self.channels.values().map(|c| blake3_hash(&c.commitment_bytes())));
        leaves.extend(self.claimables.values().map(|b| blake3_hash(&b.commitment_bytes())));
        leaves.extend(self.closed_channels.iter().map(|id| {
            let mut bytes = Vec::with_capacity(33);
            bytes.push(b'T');
            bytes.extend_from_slice(id.as_bytes());
            blake3_hash(&bytes)
        }));
        merkle_root(&leaves)
    }
}

/// Copy-on-write staging for the block being validated.
#[derive(Debug, Clone)]
pub struct Staging {
    block_hash: BlockHash,
    height: Height,
    channels: BTreeMap<ChannelId, Channel>,
    closed_channels: BTreeSet<ChannelId>,
    claimables: BTreeMap<ClaimableId, ClaimableBalance>,
    claimed: BTreeSet<ClaimableId>,
    undo: Vec<UndoRecord>,
}

impl Staging {
    pub fn new(block_hash: BlockHash, height: Height) -> Self {
        Self {
            block_hash,
            height,
            channels: BTreeMap::new(),
            closed_channels: BTreeSet::new(),
            claimables: BTreeMap::new(),
            claimed: BTreeSet::new(),
            undo: Vec::new(),
        }
    }

    pub fn block_hash(&self) -> BlockHash {
        self.block_hash
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn undo_records(&self) -> &[UndoRecord] {
        &self.undo
    }

    /// Consume the staging scope, yielding the index writes it implies and
    /// its undo records.
    pub fn into_writes(self) -> (Vec<StateWrite>, Vec<UndoRecord>) {
        let mut writes = Vec::new();
        for channel in self.channels.into_values() {
            writes.push(StateWrite::PutChannel(channel));
        }
        for id in self.closed_channels {
            writes.push(StateWrite::DeleteChannel(id));
            writes.push(StateWrite::PutTombstone(id));
        }
        for balance in self.claimables.into_values() {
            writes.push(StateWrite::PutClaimable(balance));
        }
        for id in self.claimed {
            writes.push(StateWrite::DeleteClaimable(id));
        }
        (writes, self.undo)
    }

    pub fn snapshot(&self) -> StagedSnapshot {
        StagedSnapshot {
            block_hash: self.block_hash,
            height: self.height,
            modified_channels: self.channels.values().cloned().collect(),
            closed_channels: self.closed_channels.iter().copied().collect(),
            modified_claimables: self.claimables.values().cloned().collect(),
            claimed: self.claimed.iter().copied().collect(),
            operations: self.undo.len(),
        }
    }
}

/// Immutable copy of the in-progress block's modified and deleted entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSnapshot {
    pub block_hash: BlockHash,
    pub height: Height,
    pub modified_channels: Vec<Channel>,
    pub closed_channels: Vec<ChannelId>,
    pub modified_claimables: Vec<ClaimableBalance>,
    pub claimed: Vec<ClaimableId>,
    /// Operations applied so far in this block.
    pub operations: usize,
}

/// Where a channel id stands as seen from inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Live(Channel),
    Closed,
    Absent,
}

/// Read-through view of staging over the committed index, handed to the
/// lifecycle managers.
pub struct StagedView<'a> {
    committed: &'a SettlementIndex,
    staging: &'a mut Staging,
}

impl<'a> StagedView<'a> {
    pub fn new(committed: &'a SettlementIndex, staging: &'a mut Staging) -> Self {
        Self { committed, staging }
    }

    pub fn height(&self) -> Height {
        self.staging.height
    }

    pub fn block_hash(&self) -> BlockHash {
        self.staging.block_hash
    }

    pub fn channel_state(&self, id: &ChannelId) -> ChannelState {
        if self.staging.closed_channels.contains(id) {
            return ChannelState::Closed;
        }
        if let Some(channel) = self.staging.channels.get(id) {
            return ChannelState::Live(channel.clone());
        }
        if self.committed.is_closed(id) {
            return ChannelState::Closed;
        }
        match self.committed.channel(id) {
            Some(channel) => ChannelState::Live(channel.clone()),
            None => ChannelState::Absent,
        }
    }

    pub fn claimable(&self, id: &ClaimableId) -> Option<ClaimableBalance> {
        if self.staging.claimed.contains(id) {
            return None;
        }
        self.staging
            .claimables
            .get(id)
            .or_else(|| self.committed.claimable(id))
            .cloned()
    }

    pub fn put_channel(&mut self, channel: Channel) {
        tracing::debug!(channel_id = %channel.id, nonce = channel.nonce, "Staging channel");
        self.staging.channels.insert(channel.id, channel);
    }

    pub fn close_channel(&mut self, id: ChannelId) {
        tracing::debug!(channel_id = %id, "Staging channel close");
        self.staging.channels.remove(&id);
        self.staging.closed_channels.insert(id);
    }

    pub fn put_claimable(&mut self, balance: ClaimableBalance) {
        tracing::debug!(claimable_id = %balance.id, "Staging claimable balance");
        self.staging.claimed.remove(&balance.id);
        self.staging.claimables.insert(balance.id, balance);
    }

    pub fn remove_claimable(&mut self, id: ClaimableId) {
        tracing::debug!(claimable_id = %id, "Staging claimable removal");
        self.staging.claimables.remove(&id);
        self.staging.claimed.insert(id);
    }

    pub fn record(&mut self, record: UndoRecord) {
        self.staging.undo.push(record);
    }
}
