//! Shared fixtures for the cross-crate settlement scenarios.
//!
//! Transactions are built with the reference wire encoding so that every
//! scenario runs through tag detection, parameter extraction and payout
//! checks exactly as a connected block would.

use tessera_core::script::pay_to_key;
use tessera_core::{
    Amount, BlockHash, ChannelId, ClaimableId, OutPoint, PartyKey, Transaction, TxIn, TxOut, Txid,
};
use tessera_crypto::{channel_id, claimable_id, txid, KeyPair};
use tessera_settlement::{
    Channel, ChannelOpenParams, ChannelUpdate, ClaimableClaimParams, ClaimableCreateParams,
    Claimant, WireExtractor,
};

/// Deterministic key pair for a named test participant.
pub fn party(seed: u8) -> KeyPair {
    KeyPair::from_seed(&[seed; 32])
}

pub fn alice() -> KeyPair {
    party(0xa1)
}

pub fn bob() -> KeyPair {
    party(0xb0)
}

pub fn carol() -> KeyPair {
    party(0xc0)
}

/// Block hash derived from a counter.
pub fn block_hash(n: u64) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    bytes[31] = 0xbb;
    BlockHash::from_bytes(bytes)
}

/// An ordinary spendable coin, distinct per `n`.
pub fn coin(n: u64) -> OutPoint {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_le_bytes());
    OutPoint::new(Txid::from_bytes(bytes), 0)
}

/// Transaction funding a channel between `a` and `b` in output 0.
pub fn open_channel_tx(funding_coin: u64, a: &KeyPair, b: &KeyPair, amount: Amount) -> Transaction {
    let script = WireExtractor::channel_open_script(&ChannelOpenParams {
        party_a: a.party_key(),
        party_b: b.party_key(),
        amount,
        expiry_height: 10_000,
    });
    Transaction::new(
        vec![TxIn::new(coin(funding_coin), vec![])],
        vec![TxOut::new(amount, script)],
    )
}

/// Id of the channel opened by output 0 of `tx`.
pub fn channel_id_of(tx: &Transaction) -> ChannelId {
    channel_id(&OutPoint::new(txid(tx), 0))
}

/// Transaction carrying a co-signed update in its only input.
pub fn update_channel_tx(
    fee_coin: u64,
    id: ChannelId,
    balances: [Amount; 2],
    nonce: u64,
    a: &KeyPair,
    b: &KeyPair,
) -> Transaction {
    let update = ChannelUpdate::signed(id, balances, nonce, a, b);
    Transaction::new(
        vec![TxIn::new(
            coin(fee_coin),
            WireExtractor::channel_update_witness(&update),
        )],
        vec![],
    )
}

/// Cooperative close paying each participant its final balance.
pub fn close_channel_tx(channel: &Channel) -> Transaction {
    let outputs = channel
        .parties
        .iter()
        .zip(channel.balances)
        .filter(|(_, balance)| *balance > 0)
        .map(|(party, balance)| TxOut::new(balance, pay_to_key(party)))
        .collect();
    Transaction::new(
        vec![TxIn::new(
            channel.funding_outpoint,
            WireExtractor::channel_close_witness(&channel.id),
        )],
        outputs,
    )
}

/// Transaction creating a claimable balance in output 0.
pub fn create_claimable_tx(funding_coin: u64, amount: Amount, claimants: Vec<Claimant>) -> Transaction {
    let script = WireExtractor::claimable_create_script(&ClaimableCreateParams { amount, claimants })
        .unwrap_or_default();
    Transaction::new(
        vec![TxIn::new(coin(funding_coin), vec![])],
        vec![TxOut::new(amount, script)],
    )
}

/// Id of the claimable balance created by output 0 of `tx`.
pub fn claimable_id_of(tx: &Transaction) -> ClaimableId {
    claimable_id(&OutPoint::new(txid(tx), 0))
}

/// Claim of the balance created by `create_tx`, paying `amount` to `claimer`.
pub fn claim_tx(
    create_tx: &Transaction,
    claimer: &PartyKey,
    amount: Amount,
    proof: Option<&[u8]>,
) -> Transaction {
    let funding = OutPoint::new(txid(create_tx), 0);
    let witness = WireExtractor::claimable_claim_witness(&ClaimableClaimParams {
        claimable_id: claimable_id(&funding),
        claimer: *claimer,
        proof: proof.map(<[u8]>::to_vec),
    });
    Transaction::new(
        vec![TxIn::new(funding, witness)],
        vec![TxOut::new(amount, pay_to_key(claimer))],
    )
}
