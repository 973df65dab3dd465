//! Payout validation for close and claim transactions.

use tessera_core::script::parse_pay_to_key;
use tessera_core::{Amount, PartyKey, PayoutPolicy, Transaction};

use crate::error::SettlementError;
use crate::types::{Channel, ClaimableBalance};

/// Check that a close transaction pays the channel's final balances.
pub fn check_close_payout(
    policy: PayoutPolicy,
    tx: &Transaction,
    channel: &Channel,
) -> Result<(), SettlementError> {
    check_total(tx, channel.capacity)?;
    if policy == PayoutPolicy::Aggregate {
        return Ok(());
    }
    for (party, balance) in channel.parties.iter().zip(channel.balances) {
        if balance > 0 && !pays(tx, party, balance) {
            return Err(SettlementError::PayoutMismatch(format!(
                "close of channel {} does not pay {} to {}",
                channel.id, balance, party
            )));
        }
    }
    Ok(())
}

/// Check that a claim transaction pays the balance to the claimer.
pub fn check_claim_payout(
    policy: PayoutPolicy,
    tx: &Transaction,
    balance: &ClaimableBalance,
    claimer: &PartyKey,
) -> Result<(), SettlementError> {
    check_total(tx, balance.amount)?;
    if policy == PayoutPolicy::Aggregate {
        return Ok(());
    }
    if !pays(tx, claimer, balance.amount) {
        return Err(SettlementError::PayoutMismatch(format!(
            "claim of {} does not pay {} to {}",
            balance.id, balance.amount, claimer
        )));
    }
    Ok(())
}

fn check_total(tx: &Transaction, limit: Amount) -> Result<(), SettlementError> {
    match tx.total_output_value() {
        Some(paid) if paid <= limit => Ok(()),
        Some(paid) => Err(SettlementError::PayoutExceeded { limit, paid }),
        None => Err(SettlementError::PayoutExceeded {
            limit,
            paid: Amount::MAX,
        }),
    }
}

fn pays(tx: &Transaction, key: &PartyKey, amount: Amount) -> bool {
    tx.outputs
        .iter()
        .any(|out| out.value == amount && parse_pay_to_key(&out.script_pubkey).as_ref() == Some(key))
}
