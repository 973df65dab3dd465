//! Integration test: channel open, update, close across blocks.

use tessera_core::{OperationKind, PayoutPolicy, SettlementConfig, TxOut};
use tessera_core::script::pay_to_key;
use tessera_integration_tests::*;
use tessera_settlement::{OverlayError, SettlementError, SettlementOverlay};

fn overlay() -> SettlementOverlay {
    SettlementOverlay::new(SettlementConfig::default())
}

// =========================================================================
// Open, update, stale replay
// =========================================================================

#[test]
fn test_open_update_then_stale_nonce_rejected() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());

    let open = open_channel_tx(1, &a, &b, 100_000);
    let id = channel_id_of(&open);
    overlay.connect_block(block_hash(1), 1, &[open]).unwrap();
    let channel = overlay.channel(&id).unwrap();
    assert_eq!(channel.balances, [100_000, 0]);
    assert_eq!(channel.nonce, 0);

    overlay
        .connect_block(
            block_hash(2),
            2,
            &[update_channel_tx(2, id, [60_000, 40_000], 1, &a, &b)],
        )
        .unwrap();
    let channel = overlay.channel(&id).unwrap();
    assert_eq!(channel.balances, [60_000, 40_000]);
    assert_eq!(channel.nonce, 1);

    let root = overlay.state_root();
    let err = overlay
        .connect_block(
            block_hash(3),
            3,
            &[update_channel_tx(3, id, [50_000, 50_000], 1, &a, &b)],
        )
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::StaleNonce {
            current: 1,
            proposed: 1,
            ..
        })
    ));
    assert_eq!(overlay.state_root(), root);
    assert_eq!(overlay.channel(&id).unwrap().balances, [60_000, 40_000]);
}

#[test]
fn test_open_and_update_in_same_block() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    let open = open_channel_tx(1, &a, &b, 5_000);
    let id = channel_id_of(&open);

    overlay
        .connect_block(
            block_hash(1),
            1,
            &[open, update_channel_tx(2, id, [2_000, 3_000], 1, &a, &b)],
        )
        .unwrap();
    assert_eq!(overlay.channel(&id).unwrap().balances, [2_000, 3_000]);
}

#[test]
fn test_update_before_open_in_same_block_fails() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    let open = open_channel_tx(1, &a, &b, 5_000);
    let id = channel_id_of(&open);

    let err = overlay
        .connect_block(
            block_hash(1),
            1,
            &[update_channel_tx(2, id, [2_000, 3_000], 1, &a, &b), open],
        )
        .unwrap_err();
    match err {
        OverlayError::OperationRejected { kind, source, .. } => {
            assert_eq!(kind, OperationKind::ChannelUpdate);
            assert_eq!(source, SettlementError::UnknownChannel(id));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(overlay.snapshot().channel_count(), 0);
    assert!(overlay.journal().is_empty());
}

#[test]
fn test_update_signed_by_outsider_rejected() {
    let mut overlay = overlay();
    let (a, b, c) = (alice(), bob(), carol());
    let open = open_channel_tx(1, &a, &b, 5_000);
    let id = channel_id_of(&open);
    overlay.connect_block(block_hash(1), 1, &[open]).unwrap();

    let err = overlay
        .connect_block(
            block_hash(2),
            2,
            &[update_channel_tx(2, id, [0, 5_000], 1, &a, &c)],
        )
        .unwrap_err();
    assert_eq!(
        err.settlement_error(),
        Some(&SettlementError::InvalidSignature {
            channel: id,
            party: 1
        })
    );
}

#[test]
fn test_unbalanced_update_rejected() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    let open = open_channel_tx(1, &a, &b, 5_000);
    let id = channel_id_of(&open);
    overlay.connect_block(block_hash(1), 1, &[open]).unwrap();

    let err = overlay
        .connect_block(
            block_hash(2),
            2,
            &[update_channel_tx(2, id, [3_000, 3_000], 1, &a, &b)],
        )
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::UnbalancedChannel { capacity: 5_000, .. })
    ));
}

// =========================================================================
// Close and payouts
// =========================================================================

#[test]
fn test_close_is_terminal() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    let open = open_channel_tx(1, &a, &b, 10_000);
    let id = channel_id_of(&open);
    overlay
        .connect_block(
            block_hash(1),
            1,
            &[open, update_channel_tx(2, id, [4_000, 6_000], 1, &a, &b)],
        )
        .unwrap();

    let channel = overlay.channel(&id).unwrap().clone();
    overlay
        .connect_block(block_hash(2), 2, &[close_channel_tx(&channel)])
        .unwrap();
    assert!(overlay.channel(&id).is_none());

    for (n, tx) in [
        update_channel_tx(3, id, [5_000, 5_000], 2, &a, &b),
        close_channel_tx(&channel),
    ]
    .into_iter()
    .enumerate()
    {
        let err = overlay
            .connect_block(block_hash(10 + n as u64), 3, &[tx])
            .unwrap_err();
        assert_eq!(err.settlement_error(), Some(&SettlementError::ChannelClosed(id)));
    }
}

#[test]
fn test_close_payout_policies() {
    let (a, b) = (alice(), bob());
    let open = open_channel_tx(1, &a, &b, 10_000);
    let id = channel_id_of(&open);

    let mut exact = overlay();
    exact
        .connect_block(
            block_hash(1),
            1,
            &[open.clone(), update_channel_tx(2, id, [4_000, 6_000], 1, &a, &b)],
        )
        .unwrap();
    let channel = exact.channel(&id).unwrap().clone();

    // Pays everything to party A.
    let mut skewed = close_channel_tx(&channel);
    skewed.outputs = vec![TxOut::new(10_000, pay_to_key(&a.party_key()))];

    let err = exact
        .connect_block(block_hash(2), 2, &[skewed.clone()])
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::PayoutMismatch(_))
    ));

    let mut aggregate = SettlementOverlay::new(SettlementConfig {
        payout_policy: PayoutPolicy::Aggregate,
        ..SettlementConfig::default()
    });
    aggregate
        .connect_block(
            block_hash(1),
            1,
            &[open, update_channel_tx(2, id, [4_000, 6_000], 1, &a, &b)],
        )
        .unwrap();
    aggregate.connect_block(block_hash(2), 2, &[skewed.clone()]).unwrap();

    let mut overpaid = skewed;
    overpaid.outputs.push(TxOut::new(1, pay_to_key(&b.party_key())));
    let mut aggregate2 = SettlementOverlay::new(SettlementConfig {
        payout_policy: PayoutPolicy::Aggregate,
        ..SettlementConfig::default()
    });
    aggregate2
        .connect_block(block_hash(1), 1, &[open_channel_tx(1, &a, &b, 10_000)])
        .unwrap();
    let err = aggregate2
        .connect_block(block_hash(2), 2, &[overpaid])
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::PayoutExceeded {
            limit: 10_000,
            paid: 10_001
        })
    ));
}

#[test]
fn test_identical_parties_rejected() {
    let mut overlay = overlay();
    let a = alice();
    let err = overlay
        .connect_block(block_hash(1), 1, &[open_channel_tx(1, &a, &a, 1)])
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::InvalidParty(_))
    ));
}
