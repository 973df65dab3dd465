//! Settlement operation tags.
//!
//! Tags occupy the reserved byte range `0xc0..=0xc6`, disjoint from the
//! standard script opcodes used by ordinary outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::transaction::{TxIn, TxOut};

/// Every tag in the reserved range, including those handled elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationTag {
    ChannelOpen = 0xc0,
    ChannelUpdate = 0xc1,
    ChannelClose = 0xc2,
    ClaimableCreate = 0xc3,
    ClaimableClaim = 0xc4,
    /// Fixed-amount liquidity reward claim (sibling handler).
    LiquidityClaim = 0xc5,
    /// Document hash commitment (sibling handler).
    DocumentCommit = 0xc6,
}

impl OperationTag {
    pub const FIRST: u8 = 0xc0;
    pub const LAST: u8 = 0xc6;

    /// Decode a tag byte.
    pub fn from_byte(byte: u8) -> Result<Self, CoreError> {
        match byte {
            0xc0 => Ok(Self::ChannelOpen),
            0xc1 => Ok(Self::ChannelUpdate),
            0xc2 => Ok(Self::ChannelClose),
            0xc3 => Ok(Self::ClaimableCreate),
            0xc4 => Ok(Self::ClaimableClaim),
            0xc5 => Ok(Self::LiquidityClaim),
            0xc6 => Ok(Self::DocumentCommit),
            other => Err(CoreError::UnknownTag(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// The settlement operation this tag selects, or `None` for tags owned by
    /// sibling handlers.
    pub fn settlement_kind(self) -> Option<OperationKind> {
        match self {
            Self::ChannelOpen => Some(OperationKind::ChannelOpen),
            Self::ChannelUpdate => Some(OperationKind::ChannelUpdate),
            Self::ChannelClose => Some(OperationKind::ChannelClose),
            Self::ClaimableCreate => Some(OperationKind::ClaimableCreate),
            Self::ClaimableClaim => Some(OperationKind::ClaimableClaim),
            Self::LiquidityClaim | Self::DocumentCommit => None,
        }
    }
}

/// The five operations handled by the settlement overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    ChannelOpen,
    ChannelUpdate,
    ChannelClose,
    ClaimableCreate,
    ClaimableClaim,
}

impl OperationKind {
    pub fn tag(self) -> OperationTag {
        match self {
            Self::ChannelOpen => OperationTag::ChannelOpen,
            Self::ChannelUpdate => OperationTag::ChannelUpdate,
            Self::ChannelClose => OperationTag::ChannelClose,
            Self::ClaimableCreate => OperationTag::ClaimableCreate,
            Self::ClaimableClaim => OperationTag::ClaimableClaim,
        }
    }

    /// Whether the operation is carried by an output (as opposed to the
    /// witness of a spending input).
    pub fn is_output_operation(self) -> bool {
        matches!(self, Self::ChannelOpen | Self::ClaimableCreate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelOpen => write!(f, "channel-open"),
            Self::ChannelUpdate => write!(f, "channel-update"),
            Self::ChannelClose => write!(f, "channel-close"),
            Self::ClaimableCreate => write!(f, "claimable-create"),
            Self::ClaimableClaim => write!(f, "claimable-claim"),
        }
    }
}

/// Detect a settlement tag at the start of an output script.
pub fn output_tag(output: &TxOut) -> Option<OperationTag> {
    let first = *output.script_pubkey.first()?;
    let tag = OperationTag::from_byte(first).ok()?;
    // Input-side operations placed on an output are not operations.
    match tag.settlement_kind() {
        Some(kind) if !kind.is_output_operation() => None,
        _ => Some(tag),
    }
}

/// Detect a settlement tag in the first witness item of an input.
pub fn input_tag(input: &TxIn) -> Option<OperationTag> {
    match input.witness.first()?.as_slice() {
        [byte] => {
            let tag = OperationTag::from_byte(*byte).ok()?;
            match tag.settlement_kind() {
                Some(kind) if kind.is_output_operation() => None,
                _ => Some(tag),
            }
        }
        _ => None,
    }
}
