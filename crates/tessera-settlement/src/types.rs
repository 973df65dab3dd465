use serde::{Deserialize, Serialize};
use tessera_core::{Amount, ChannelId, ClaimableId, Height, OutPoint, PartyKey};
use tessera_crypto::{sign, KeyPair, Signature};

use crate::predicate::Predicate;

/// Domain separator for channel update signatures.
pub const CHANNEL_UPDATE_DOMAIN: &[u8] = b"tessera/channel-update/v1";

/// A bilateral payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    /// Participant keys; `parties[i]` owns `balances[i]`.
    pub parties: [PartyKey; 2],
    /// Total value locked at open. Never changes.
    pub capacity: Amount,
    pub balances: [Amount; 2],
    /// Strictly increasing update counter, 0 at open.
    pub nonce: u64,
    /// Advisory expiry for the funding layer; not enforced here.
    pub expiry_height: Height,
    pub funding_outpoint: OutPoint,
}

impl Channel {
    /// Whether the balances sum to the capacity.
    pub fn is_balanced(&self) -> bool {
        self.balances[0].checked_add(self.balances[1]) == Some(self.capacity)
    }

    /// Deterministic encoding committed to by the state root.
    pub fn commitment_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 32 * 3 + 8 * 5 + 36);
        out.push(b'C');
        out.extend_from_slice(self.id.as_bytes());
        out.extend_from_slice(self.parties[0].as_bytes());
        out.extend_from_slice(self.parties[1].as_bytes());
        out.extend_from_slice(&self.capacity.to_le_bytes());
        out.extend_from_slice(&self.balances[0].to_le_bytes());
        out.extend_from_slice(&self.balances[1].to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.expiry_height.to_le_bytes());
        out.extend_from_slice(&self.funding_outpoint.to_bytes());
        out
    }
}

/// A claimant entry: who may claim and under which condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimant {
    pub destination: PartyKey,
    pub predicate: Predicate,
}

impl Claimant {
    pub fn new(destination: PartyKey, predicate: Predicate) -> Self {
        Self {
            destination,
            predicate,
        }
    }
}

/// A conditional, single-claim balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalance {
    pub id: ClaimableId,
    pub amount: Amount,
    pub claimants: Vec<Claimant>,
    pub created_at: Height,
    pub funding_outpoint: OutPoint,
}

impl ClaimableBalance {
    /// First claimant whose destination is `claimer`.
    pub fn claimant_for(&self, claimer: &PartyKey) -> Option<&Claimant> {
        self.claimants.iter().find(|c| &c.destination == claimer)
    }

    /// Deterministic encoding committed to by the state root.
    pub fn commitment_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(b'B');
        out.extend_from_slice(self.id.as_bytes());
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.created_at.to_le_bytes());
        out.extend_from_slice(&self.funding_outpoint.to_bytes());
        out.extend_from_slice(&(self.claimants.len() as u32).to_le_bytes());
        for claimant in &self.claimants {
            out.extend_from_slice(claimant.destination.as_bytes());
            claimant.predicate.encode(&mut out);
        }
        out
    }
}

/// Parameters of a channel-open operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOpenParams {
    pub party_a: PartyKey,
    pub party_b: PartyKey,
    pub amount: Amount,
    pub expiry_height: Height,
}

/// A co-signed channel state update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub channel_id: ChannelId,
    pub balances: [Amount; 2],
    pub nonce: u64,
    /// Signatures of party A and party B over [`Self::signing_payload`].
    pub signatures: [Signature; 2],
}

impl ChannelUpdate {
    /// Build an update signed by both participants.
    pub fn signed(
        channel_id: ChannelId,
        balances: [Amount; 2],
        nonce: u64,
        party_a: &KeyPair,
        party_b: &KeyPair,
    ) -> Self {
        let payload = Self::payload(&channel_id, &balances, nonce);
        Self {
            channel_id,
            balances,
            nonce,
            signatures: [sign(&payload, party_a), sign(&payload, party_b)],
        }
    }

    /// Bytes each participant signs.
    pub fn signing_payload(&self) -> Vec<u8> {
        Self::payload(&self.channel_id, &self.balances, self.nonce)
    }

    fn payload(channel_id: &ChannelId, balances: &[Amount; 2], nonce: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHANNEL_UPDATE_DOMAIN.len() + 32 + 24);
        out.extend_from_slice(CHANNEL_UPDATE_DOMAIN);
        out.extend_from_slice(channel_id.as_bytes());
        out.extend_from_slice(&balances[0].to_le_bytes());
        out.extend_from_slice(&balances[1].to_le_bytes());
        out.extend_from_slice(&nonce.to_le_bytes());
        out
    }
}

/// Parameters of a channel-close operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCloseParams {
    pub channel_id: ChannelId,
}

/// Parameters of a claimable-create operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimableCreateParams {
    pub amount: Amount,
    pub claimants: Vec<Claimant>,
}

/// Parameters of a claimable-claim operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimableClaimParams {
    pub claimable_id: ClaimableId,
    pub claimer: PartyKey,
    pub proof: Option<Vec<u8>>,
}
