//! Channel lifecycle: open, co-signed update, cooperative close.

use tessera_core::OutPoint;
use tessera_crypto::{channel_id, verify, PublicKey};

use crate::error::SettlementError;
use crate::journal::UndoRecord;
use crate::state::{ChannelState, StagedView};
use crate::types::{Channel, ChannelCloseParams, ChannelOpenParams, ChannelUpdate};

/// Applies channel operations to a staged view.
///
/// Every check runs before the first staged write, so a rejected operation
/// leaves the view untouched.
pub struct ChannelManager;

impl ChannelManager {
    /// Open a channel funded by `funding_outpoint`. Party A receives the
    /// full capacity.
    pub fn open(
        view: &mut StagedView<'_>,
        params: &ChannelOpenParams,
        funding_outpoint: OutPoint,
    ) -> Result<Channel, SettlementError> {
        for (label, key) in [("A", &params.party_a), ("B", &params.party_b)] {
            PublicKey::from_party_key(key).map_err(|e| {
                SettlementError::InvalidParty(format!("party {} key {}: {}", label, key, e))
            })?;
        }
        if params.party_a == params.party_b {
            return Err(SettlementError::InvalidParty(
                "both parties share the same key".into(),
            ));
        }

        let id = channel_id(&funding_outpoint);
        if !matches!(view.channel_state(&id), ChannelState::Absent) {
            return Err(SettlementError::DuplicateChannel(id));
        }

        let channel = Channel {
            id,
            parties: [params.party_a, params.party_b],
            capacity: params.amount,
            balances: [params.amount, 0],
            nonce: 0,
            expiry_height: params.expiry_height,
            funding_outpoint,
        };
        view.put_channel(channel.clone());
        view.record(UndoRecord::ChannelOpened { id });

        tracing::info!(
            channel_id = %id,
            capacity = channel.capacity,
            height = view.height(),
            "Channel opened"
        );
        Ok(channel)
    }

    /// Apply a co-signed balance update.
    pub fn update(
        view: &mut StagedView<'_>,
        update: &ChannelUpdate,
    ) -> Result<Channel, SettlementError> {
        let id = update.channel_id;
        let current = match view.channel_state(&id) {
            ChannelState::Live(channel) => channel,
            ChannelState::Closed => return Err(SettlementError::ChannelClosed(id)),
            ChannelState::Absent => return Err(SettlementError::UnknownChannel(id)),
        };

        if update.nonce <= current.nonce {
            return Err(SettlementError::StaleNonce {
                channel: id,
                current: current.nonce,
                proposed: update.nonce,
            });
        }

        let sum = update.balances[0].checked_add(update.balances[1]);
        if sum != Some(current.capacity) {
            return Err(SettlementError::UnbalancedChannel {
                channel: id,
                balances: update.balances,
                capacity: current.capacity,
            });
        }

        let payload = update.signing_payload();
        for (party, (key, signature)) in current.parties.iter().zip(&update.signatures).enumerate() {
            let valid = PublicKey::from_party_key(key)
                .map(|pk| verify(&payload, signature, &pk).is_ok())
                .unwrap_or(false);
            if !valid {
                return Err(SettlementError::InvalidSignature { channel: id, party });
            }
        }

        let mut next = current.clone();
        next.balances = update.balances;
        next.nonce = update.nonce;
        view.put_channel(next.clone());
        view.record(UndoRecord::ChannelUpdated { prior: current });

        tracing::info!(
            channel_id = %id,
            nonce = next.nonce,
            balance_a = next.balances[0],
            balance_b = next.balances[1],
            "Channel updated"
        );
        Ok(next)
    }

    /// Close a channel, returning its final state.
    pub fn close(
        view: &mut StagedView<'_>,
        params: &ChannelCloseParams,
    ) -> Result<Channel, SettlementError> {
        let id = params.channel_id;
        let channel = match view.channel_state(&id) {
            ChannelState::Live(channel) => channel,
            ChannelState::Closed => return Err(SettlementError::ChannelClosed(id)),
            ChannelState::Absent => return Err(SettlementError::UnknownChannel(id)),
        };

        view.close_channel(id);
        view.record(UndoRecord::ChannelClosed {
            removed: channel.clone(),
        });

        tracing::info!(
            channel_id = %id,
            nonce = channel.nonce,
            height = view.height(),
            "Channel closed"
        );
        Ok(channel)
    }
}
