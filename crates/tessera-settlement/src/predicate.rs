//! Claim predicates and their evaluation.
//!
//! Time conditions are evaluated against a timestamp derived from the block
//! height (`height * block_interval_secs`), never against miner-reported
//! header time.

use serde::{Deserialize, Serialize};
use tessera_core::Height;
use tessera_crypto::{sha256, Hash};

use crate::error::SettlementError;

const TAG_UNCONDITIONAL: u8 = 0x00;
const TAG_BEFORE_HEIGHT: u8 = 0x01;
const TAG_AFTER_HEIGHT: u8 = 0x02;
const TAG_HASH_PREIMAGE: u8 = 0x03;
const TAG_AND: u8 = 0x04;
const TAG_OR: u8 = 0x05;
const TAG_NOT: u8 = 0x06;

/// Hard cap on nesting accepted by the decoder, independent of the
/// configured consensus limit.
pub const MAX_DECODE_DEPTH: usize = 32;

/// Condition gating a claimant's right to a claimable balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Unconditional,
    /// Satisfied strictly before the given height.
    BeforeHeight(Height),
    /// Satisfied at or after the given height.
    AfterHeight(Height),
    /// Satisfied by a proof whose SHA-256 equals the stored hash.
    HashPreimage(#[serde(with = "hex::serde")] Hash),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn and(left: Predicate, right: Predicate) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Hash-lock on the SHA-256 of `preimage`.
    pub fn hash_of(preimage: &[u8]) -> Self {
        Self::HashPreimage(sha256(preimage))
    }

    /// Nesting depth; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Unconditional
            | Self::BeforeHeight(_)
            | Self::AfterHeight(_)
            | Self::HashPreimage(_) => 1,
            Self::And(l, r) | Self::Or(l, r) => 1 + l.depth().max(r.depth()),
            Self::Not(inner) => 1 + inner.depth(),
        }
    }

    /// Append the wire encoding of this predicate to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Unconditional => out.push(TAG_UNCONDITIONAL),
            Self::BeforeHeight(h) => {
                out.push(TAG_BEFORE_HEIGHT);
                out.extend_from_slice(&h.to_le_bytes());
            }
            Self::AfterHeight(h) => {
                out.push(TAG_AFTER_HEIGHT);
                out.extend_from_slice(&h.to_le_bytes());
            }
            Self::HashPreimage(hash) => {
                out.push(TAG_HASH_PREIMAGE);
                out.extend_from_slice(hash);
            }
            Self::And(l, r) => {
                out.push(TAG_AND);
                l.encode(out);
                r.encode(out);
            }
            Self::Or(l, r) => {
                out.push(TAG_OR);
                l.encode(out);
                r.encode(out);
            }
            Self::Not(inner) => {
                out.push(TAG_NOT);
                inner.encode(out);
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Decode one predicate from the front of `bytes`, returning it together
    /// with the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), SettlementError> {
        let mut pos = 0;
        let predicate = Self::decode_at(bytes, &mut pos, 1)?;
        Ok((predicate, pos))
    }

    fn decode_at(bytes: &[u8], pos: &mut usize, depth: usize) -> Result<Self, SettlementError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(SettlementError::Malformed(format!(
                "predicate nesting exceeds {}",
                MAX_DECODE_DEPTH
            )));
        }
        let tag = *bytes
            .get(*pos)
            .ok_or_else(|| SettlementError::Malformed("truncated predicate".into()))?;
        *pos += 1;
        match tag {
            TAG_UNCONDITIONAL => Ok(Self::Unconditional),
            TAG_BEFORE_HEIGHT => Ok(Self::BeforeHeight(read_u64(bytes, pos)?)),
            TAG_AFTER_HEIGHT => Ok(Self::AfterHeight(read_u64(bytes, pos)?)),
            TAG_HASH_PREIMAGE => {
                let end = *pos + 32;
                let hash: Hash = bytes
                    .get(*pos..end)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| SettlementError::Malformed("truncated predicate hash".into()))?;
                *pos = end;
                Ok(Self::HashPreimage(hash))
            }
            TAG_AND | TAG_OR => {
                let left = Self::decode_at(bytes, pos, depth + 1)?;
                let right = Self::decode_at(bytes, pos, depth + 1)?;
                Ok(if tag == TAG_AND {
                    Self::and(left, right)
                } else {
                    Self::or(left, right)
                })
            }
            TAG_NOT => Ok(Self::not(Self::decode_at(bytes, pos, depth + 1)?)),
            other => Err(SettlementError::Malformed(format!(
                "unknown predicate tag {:#04x}",
                other
            ))),
        }
    }
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> Result<u64, SettlementError> {
    let end = *pos + 8;
    let raw: [u8; 8] = bytes
        .get(*pos..end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| SettlementError::Malformed("truncated predicate height".into()))?;
    *pos = end;
    Ok(u64::from_le_bytes(raw))
}

/// Pure evaluator for claim predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateEvaluator {
    block_interval_secs: u64,
}

impl PredicateEvaluator {
    pub fn new(block_interval_secs: u64) -> Self {
        Self {
            block_interval_secs,
        }
    }

    /// Timestamp implied by a block height.
    pub fn timestamp(&self, height: Height) -> u64 {
        height.saturating_mul(self.block_interval_secs)
    }

    /// Evaluate `predicate` at `height` with an optional revealed `proof`.
    ///
    /// Never fails; an unsatisfiable predicate evaluates to `false`.
    pub fn evaluate(&self, predicate: &Predicate, height: Height, proof: Option<&[u8]>) -> bool {
        let now = self.timestamp(height);
        self.eval(predicate, now, proof)
    }

    fn eval(&self, predicate: &Predicate, now: u64, proof: Option<&[u8]>) -> bool {
        match predicate {
            Predicate::Unconditional => true,
            Predicate::BeforeHeight(h) => now < self.timestamp(*h),
            Predicate::AfterHeight(h) => now >= self.timestamp(*h),
            Predicate::HashPreimage(expected) => {
                proof.map(|p| sha256(p) == *expected).unwrap_or(false)
            }
            Predicate::And(l, r) => self.eval(l, now, proof) && self.eval(r, now, proof),
            Predicate::Or(l, r) => self.eval(l, now, proof) || self.eval(r, now, proof),
            Predicate::Not(inner) => !self.eval(inner, now, proof),
        }
    }
}
