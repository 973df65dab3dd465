//! Tessera Settlement Layer
//!
//! Payment channels and conditional claimable balances maintained as
//! consensus state next to the UTXO set. Every mutation is staged per block,
//! committed atomically when the block connects, and reversible through a
//! per-block undo journal when the block is disconnected.

pub mod error;
pub mod types;
pub mod predicate;
pub mod state;
pub mod journal;
pub mod channel;
pub mod claimable;
pub mod extract;
pub mod payout;
pub mod overlay;

pub use error::{OverlayError, SettlementError};
pub use types::{
    Channel, ChannelCloseParams, ChannelOpenParams, ChannelUpdate, ClaimableBalance,
    ClaimableClaimParams, ClaimableCreateParams, Claimant,
};
pub use predicate::{Predicate, PredicateEvaluator};
pub use state::{ChannelState, SettlementIndex, StagedSnapshot, StagedView, Staging};
pub use journal::{BlockUndo, ChangeSet, StateWrite, UndoJournal, UndoRecord};
pub use channel::ChannelManager;
pub use claimable::ClaimableManager;
pub use extract::{ParamExtractor, WireExtractor};
pub use overlay::SettlementOverlay;
