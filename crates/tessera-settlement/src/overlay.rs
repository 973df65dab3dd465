//! The settlement overlay: block-scoped staging over the committed index.
//!
//! The block validation engine drives one block at a time:
//! `begin_block`, then `process_operation` for every tagged input and output
//! in order, then `commit` or `discard`. Disconnecting a block replays its
//! undo journal entry in reverse.

use std::sync::Arc;

use tessera_core::opcode::{input_tag, output_tag};
use tessera_core::{
    Amount, BlockHash, ChannelId, ClaimableId, Height, OperationKind, OutPoint, SettlementConfig,
    Transaction, TxIn, TxOut,
};
use tessera_crypto::{txid, Hash};

use crate::channel::ChannelManager;
use crate::claimable::ClaimableManager;
use crate::error::{OverlayError, SettlementError};
use crate::extract::{ParamExtractor, WireExtractor};
use crate::journal::{BlockUndo, ChangeSet, StateWrite, UndoJournal};
use crate::payout::{check_claim_payout, check_close_payout};
use crate::state::{SettlementIndex, StagedSnapshot, StagedView, Staging};
use crate::types::{Channel, ClaimableBalance};

/// Owner of the committed settlement index and its undo journal.
pub struct SettlementOverlay {
    config: SettlementConfig,
    claimables: ClaimableManager,
    extractor: Box<dyn ParamExtractor + Send + Sync>,
    index: Arc<SettlementIndex>,
    staging: Option<Staging>,
    journal: UndoJournal,
}

impl SettlementOverlay {
    /// Empty overlay using the reference wire extractor.
    pub fn new(config: SettlementConfig) -> Self {
        Self::from_parts(config, SettlementIndex::new(), UndoJournal::new())
    }

    /// Rebuild an overlay from a persisted index and journal.
    pub fn from_parts(config: SettlementConfig, index: SettlementIndex, journal: UndoJournal) -> Self {
        Self {
            claimables: ClaimableManager::new(&config),
            config,
            extractor: Box::new(WireExtractor),
            index: Arc::new(index),
            staging: None,
            journal,
        }
    }

    /// Replace the parameter extractor.
    pub fn with_extractor(mut self, extractor: Box<dyn ParamExtractor + Send + Sync>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Open a staging scope for `block_hash` at `height`.
    ///
    /// `height` must be above the height of the journal tip.
    pub fn begin_block(&mut self, block_hash: BlockHash, height: Height) -> Result<(), OverlayError> {
        if let Some(staging) = &self.staging {
            tracing::error!(
                in_progress = %staging.block_hash(),
                requested = %block_hash,
                "Block already in progress"
            );
            return Err(OverlayError::BlockInProgress(staging.block_hash()));
        }
        if self.journal.contains(&block_hash) {
            return Err(OverlayError::DuplicateBlock(block_hash));
        }
        if let Some(tip) = self.journal.tip() {
            if height <= tip.height {
                tracing::error!(
                    block_hash = %block_hash,
                    height,
                    tip_height = tip.height,
                    "Block does not extend the journal tip"
                );
                return Err(OverlayError::NonIncreasingHeight {
                    block_hash,
                    height,
                    tip_height: tip.height,
                });
            }
        }
        tracing::debug!(block_hash = %block_hash, height, "Beginning block");
        self.staging = Some(Staging::new(block_hash, height));
        Ok(())
    }

    /// Apply one tagged operation of transaction `tx`.
    ///
    /// `index` is the input index for channel-update, channel-close and
    /// claimable-claim, and the output index for channel-open and
    /// claimable-create. A rejected operation discards the whole block.
    pub fn process_operation(
        &mut self,
        kind: OperationKind,
        tx: &Transaction,
        index: usize,
        height: Height,
    ) -> Result<(), OverlayError> {
        let mut staging = match self.staging.take() {
            Some(staging) => staging,
            None => {
                tracing::error!(kind = %kind, "Operation outside of a block");
                return Err(OverlayError::NoBlockInProgress);
            }
        };
        if staging.height() != height {
            let expected = staging.height();
            self.staging = Some(staging);
            return Err(OverlayError::HeightMismatch {
                expected,
                actual: height,
            });
        }

        let txid = txid(tx);
        match self.apply(kind, tx, index, &mut staging) {
            Ok(()) => {
                self.staging = Some(staging);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(
                    kind = %kind,
                    txid = %txid,
                    index,
                    block_hash = %staging.block_hash(),
                    height,
                    error = source.kind(),
                    "Settlement operation rejected: {}",
                    source
                );
                Err(OverlayError::OperationRejected {
                    kind,
                    txid,
                    index,
                    source,
                })
            }
        }
    }

    fn apply(
        &self,
        kind: OperationKind,
        tx: &Transaction,
        index: usize,
        staging: &mut Staging,
    ) -> Result<(), SettlementError> {
        let mut view = StagedView::new(&self.index, staging);
        match kind {
            OperationKind::ChannelOpen => {
                let output = tagged_output(tx, index)?;
                let params = self.extractor.channel_open(&output.script_pubkey, &[])?;
                check_funding(params.amount, output.value)?;
                ChannelManager::open(&mut view, &params, funding_outpoint(tx, index)?)?;
            }
            OperationKind::ChannelUpdate => {
                let input = tagged_input(tx, index)?;
                let update = self.extractor.channel_update(&input.witness)?;
                ChannelManager::update(&mut view, &update)?;
            }
            OperationKind::ChannelClose => {
                let input = tagged_input(tx, index)?;
                let params = self.extractor.channel_close(&input.witness)?;
                let channel = ChannelManager::close(&mut view, &params)?;
                check_spends(input, &channel.funding_outpoint)?;
                check_close_payout(self.config.payout_policy, tx, &channel)?;
            }
            OperationKind::ClaimableCreate => {
                let output = tagged_output(tx, index)?;
                let params = self.extractor.claimable_create(&output.script_pubkey, &[])?;
                check_funding(params.amount, output.value)?;
                self.claimables
                    .create(&mut view, &params, funding_outpoint(tx, index)?)?;
            }
            OperationKind::ClaimableClaim => {
                let input = tagged_input(tx, index)?;
                let params = self.extractor.claimable_claim(&input.witness)?;
                let balance = self.claimables.claim(&mut view, &params)?;
                check_spends(input, &balance.funding_outpoint)?;
                check_claim_payout(self.config.payout_policy, tx, &balance, &params.claimer)?;
            }
        }
        Ok(())
    }

    /// Merge staging into the committed index and journal the block.
    pub fn commit(&mut self) -> Result<ChangeSet, OverlayError> {
        let staging = self.staging.take().ok_or_else(|| {
            tracing::error!("Commit without a block in progress");
            OverlayError::NoBlockInProgress
        })?;
        let block_hash = staging.block_hash();
        let height = staging.height();
        let (writes, records) = staging.into_writes();

        let mut changes = ChangeSet::new();
        let index = Arc::make_mut(&mut self.index);
        for write in writes {
            index.apply(&write);
            changes.push(write);
        }

        let operations = records.len();
        let entry = BlockUndo {
            block_hash,
            height,
            records,
        };
        self.journal.push(entry.clone());
        changes.push(StateWrite::PutJournal(entry));

        tracing::info!(
            block_hash = %block_hash,
            height,
            operations,
            writes = changes.len(),
            "Settlement block committed"
        );
        Ok(changes)
    }

    /// Drop the in-progress block without touching the committed index.
    pub fn discard(&mut self) {
        if let Some(staging) = self.staging.take() {
            tracing::debug!(
                block_hash = %staging.block_hash(),
                height = staging.height(),
                "Settlement block discarded"
            );
        }
    }

    /// Revert the most recently committed block.
    pub fn undo(&mut self, block_hash: &BlockHash) -> Result<ChangeSet, OverlayError> {
        if let Some(staging) = &self.staging {
            return Err(OverlayError::BlockInProgress(staging.block_hash()));
        }
        let tip = match self.journal.tip() {
            Some(tip) => tip.block_hash,
            None => {
                tracing::error!(block_hash = %block_hash, "Undo journal is empty");
                return Err(OverlayError::MissingUndoJournal(*block_hash));
            }
        };
        if &tip != block_hash {
            if self.journal.contains(block_hash) {
                tracing::error!(tip = %tip, requested = %block_hash, "Out-of-order undo");
                return Err(OverlayError::OutOfOrderUndo {
                    tip,
                    requested: *block_hash,
                });
            }
            tracing::error!(block_hash = %block_hash, "Undo journal entry missing");
            return Err(OverlayError::MissingUndoJournal(*block_hash));
        }
        let entry = self
            .journal
            .pop_tip()
            .ok_or(OverlayError::MissingUndoJournal(*block_hash))?;

        let mut changes = ChangeSet::new();
        let index = Arc::make_mut(&mut self.index);
        for record in entry.records.iter().rev() {
            for write in record.reversal() {
                index.apply(&write);
                changes.push(write);
            }
        }
        changes.push(StateWrite::DeleteJournal {
            height: entry.height,
            block_hash: entry.block_hash,
        });

        tracing::info!(
            block_hash = %entry.block_hash,
            height = entry.height,
            operations = entry.records.len(),
            "Settlement block undone"
        );
        Ok(changes)
    }

    /// Drop journal entries buried more than `journal_retention` blocks below
    /// `tip_height`.
    pub fn prune_journal(&mut self, tip_height: Height) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let Some(cutoff) = tip_height.checked_sub(self.config.journal_retention) else {
            return changes;
        };
        for entry in self.journal.prune(cutoff) {
            changes.push(StateWrite::DeleteJournal {
                height: entry.height,
                block_hash: entry.block_hash,
            });
        }
        if !changes.is_empty() {
            tracing::debug!(
                tip_height,
                cutoff,
                pruned = changes.len(),
                "Pruned undo journal"
            );
        }
        changes
    }

    /// Connect a full block: detect tags, apply every operation in order and
    /// commit, or discard on the first failure.
    ///
    /// Inputs are processed before outputs within each transaction. Tags
    /// owned by sibling handlers are skipped.
    pub fn connect_block(
        &mut self,
        block_hash: BlockHash,
        height: Height,
        transactions: &[Transaction],
    ) -> Result<ChangeSet, OverlayError> {
        self.begin_block(block_hash, height)?;
        if let Err(e) = self.process_transactions(height, transactions) {
            self.discard();
            return Err(e);
        }
        self.commit()
    }

    fn process_transactions(
        &mut self,
        height: Height,
        transactions: &[Transaction],
    ) -> Result<(), OverlayError> {
        for tx in transactions {
            for (i, input) in tx.inputs.iter().enumerate() {
                if let Some(tag) = input_tag(input) {
                    match tag.settlement_kind() {
                        Some(kind) => self.process_operation(kind, tx, i, height)?,
                        None => tracing::trace!(tag = tag.as_byte(), "Skipping sibling tag"),
                    }
                }
            }
            for (i, output) in tx.outputs.iter().enumerate() {
                if let Some(tag) = output_tag(output) {
                    match tag.settlement_kind() {
                        Some(kind) => self.process_operation(kind, tx, i, height)?,
                        None => tracing::trace!(tag = tag.as_byte(), "Skipping sibling tag"),
                    }
                }
            }
        }
        Ok(())
    }

    /// Disconnect a block previously connected with [`Self::connect_block`].
    pub fn disconnect_block(&mut self, block_hash: &BlockHash) -> Result<ChangeSet, OverlayError> {
        self.undo(block_hash)
    }

    /// Snapshot of the in-progress block's modified and deleted entities.
    pub fn staged(&self) -> Option<StagedSnapshot> {
        self.staging.as_ref().map(Staging::snapshot)
    }

    /// Shared handle to the committed index.
    pub fn snapshot(&self) -> Arc<SettlementIndex> {
        Arc::clone(&self.index)
    }

    /// Commitment over the committed index.
    pub fn state_root(&self) -> Hash {
        self.index.state_root()
    }

    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.index.channel(id)
    }

    pub fn claimable(&self, id: &ClaimableId) -> Option<&ClaimableBalance> {
        self.index.claimable(id)
    }

    pub fn journal(&self) -> &UndoJournal {
        &self.journal
    }

    pub fn in_block(&self) -> bool {
        self.staging.is_some()
    }
}

fn tagged_output(tx: &Transaction, index: usize) -> Result<&TxOut, SettlementError> {
    tx.outputs.get(index).ok_or_else(|| {
        SettlementError::Malformed(format!(
            "output index {} out of range ({} outputs)",
            index,
            tx.outputs.len()
        ))
    })
}

fn tagged_input(tx: &Transaction, index: usize) -> Result<&TxIn, SettlementError> {
    tx.inputs.get(index).ok_or_else(|| {
        SettlementError::Malformed(format!(
            "input index {} out of range ({} inputs)",
            index,
            tx.inputs.len()
        ))
    })
}

fn funding_outpoint(tx: &Transaction, index: usize) -> Result<OutPoint, SettlementError> {
    let vout = u32::try_from(index)
        .map_err(|_| SettlementError::Malformed(format!("output index {} too large", index)))?;
    Ok(OutPoint::new(txid(tx), vout))
}

fn check_funding(declared: Amount, actual: Amount) -> Result<(), SettlementError> {
    if declared != actual {
        return Err(SettlementError::FundingMismatch { declared, actual });
    }
    Ok(())
}

fn check_spends(input: &TxIn, funding: &OutPoint) -> Result<(), SettlementError> {
    if &input.previous_output != funding {
        return Err(SettlementError::FundingNotSpent { expected: *funding });
    }
    Ok(())
}
