pub mod error;
pub mod types;
pub mod transaction;
pub mod script;
pub mod opcode;
pub mod config;

pub use error::CoreError;
pub use types::{Amount, BlockHash, ChannelId, ClaimableId, Height, OutPoint, PartyKey, Txid};
pub use transaction::{Transaction, TxIn, TxOut};
pub use opcode::{OperationKind, OperationTag};
pub use config::{PayoutPolicy, SettlementConfig};
