use tessera_core::{
    Amount, BlockHash, ChannelId, ClaimableId, Height, OperationKind, OutPoint, PartyKey, Txid,
};

/// Errors raised while validating a single settlement operation.
///
/// Every variant is fatal to the block that carries the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("malformed operation: {0}")]
    Malformed(String),

    #[error("invalid channel party: {0}")]
    InvalidParty(String),

    #[error("channel already exists: {0}")]
    DuplicateChannel(ChannelId),

    #[error("channel not found: {0}")]
    UnknownChannel(ChannelId),

    #[error("channel already closed: {0}")]
    ChannelClosed(ChannelId),

    #[error("stale nonce for channel {channel}: current {current}, proposed {proposed}")]
    StaleNonce {
        channel: ChannelId,
        current: u64,
        proposed: u64,
    },

    #[error("unbalanced update for channel {channel}: balances {balances:?}, capacity {capacity}")]
    UnbalancedChannel {
        channel: ChannelId,
        balances: [Amount; 2],
        capacity: Amount,
    },

    #[error("invalid signature from party {party} on channel {channel}")]
    InvalidSignature { channel: ChannelId, party: usize },

    #[error("claimable balance has no claimants")]
    EmptyClaimants,

    #[error("too many claimants: {count} (max {max})")]
    TooManyClaimants { count: usize, max: usize },

    #[error("predicate depth {depth} exceeds maximum {max}")]
    PredicateTooDeep { depth: usize, max: usize },

    #[error("proof of {len} bytes exceeds maximum {max}")]
    ProofTooLong { len: usize, max: usize },

    #[error("claimable balance already exists: {0}")]
    DuplicateClaimable(ClaimableId),

    #[error("claimable balance not found: {0}")]
    UnknownClaimable(ClaimableId),

    #[error("no claimant {claimer} on claimable balance {claimable}")]
    NoMatchingClaimant {
        claimable: ClaimableId,
        claimer: PartyKey,
    },

    #[error("predicate not satisfied for claimable balance {claimable} at height {height}")]
    PredicateNotSatisfied {
        claimable: ClaimableId,
        height: Height,
    },

    #[error("funding output value {actual} does not match declared amount {declared}")]
    FundingMismatch { declared: Amount, actual: Amount },

    #[error("operation input does not spend funding outpoint {expected}")]
    FundingNotSpent { expected: OutPoint },

    #[error("transaction pays out {paid}, more than the {limit} available")]
    PayoutExceeded { limit: Amount, paid: Amount },

    #[error("payout mismatch: {0}")]
    PayoutMismatch(String),
}

impl SettlementError {
    /// Stable name of the error kind, for rejection reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::InvalidParty(_) => "invalid-party",
            Self::DuplicateChannel(_) => "duplicate-channel",
            Self::UnknownChannel(_) => "unknown-channel",
            Self::ChannelClosed(_) => "channel-closed",
            Self::StaleNonce { .. } => "stale-nonce",
            Self::UnbalancedChannel { .. } => "unbalanced-channel",
            Self::InvalidSignature { .. } => "invalid-signature",
            Self::EmptyClaimants => "empty-claimants",
            Self::TooManyClaimants { .. } => "too-many-claimants",
            Self::PredicateTooDeep { .. } => "predicate-too-deep",
            Self::ProofTooLong { .. } => "proof-too-long",
            Self::DuplicateClaimable(_) => "duplicate-claimable",
            Self::UnknownClaimable(_) => "unknown-claimable",
            Self::NoMatchingClaimant { .. } => "no-matching-claimant",
            Self::PredicateNotSatisfied { .. } => "predicate-not-satisfied",
            Self::FundingMismatch { .. } => "funding-mismatch",
            Self::FundingNotSpent { .. } => "funding-not-spent",
            Self::PayoutExceeded { .. } => "payout-exceeded",
            Self::PayoutMismatch(_) => "payout-mismatch",
        }
    }
}

/// Errors surfaced by the settlement overlay to the block validation engine.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("{kind} rejected in transaction {txid} at index {index}: {source}")]
    OperationRejected {
        kind: OperationKind,
        txid: Txid,
        index: usize,
        source: SettlementError,
    },

    #[error("no block in progress")]
    NoBlockInProgress,

    #[error("block {0} is already being validated")]
    BlockInProgress(BlockHash),

    #[error("operation height {actual} does not match block height {expected}")]
    HeightMismatch { expected: Height, actual: Height },

    #[error("block {0} is already connected")]
    DuplicateBlock(BlockHash),

    #[error("block {block_hash} at height {height} does not extend journal tip at height {tip_height}")]
    NonIncreasingHeight {
        block_hash: BlockHash,
        height: Height,
        tip_height: Height,
    },

    #[error("undo journal missing for block {0}")]
    MissingUndoJournal(BlockHash),

    #[error("cannot undo block {requested}: tip of the undo journal is {tip}")]
    OutOfOrderUndo { tip: BlockHash, requested: BlockHash },
}

impl OverlayError {
    /// The settlement error behind a rejected operation.
    pub fn settlement_error(&self) -> Option<&SettlementError> {
        match self {
            Self::OperationRejected { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the error signals inconsistent overlay state rather than an
    /// invalid block.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::MissingUndoJournal(_) | Self::OutOfOrderUndo { .. }
        )
    }
}
