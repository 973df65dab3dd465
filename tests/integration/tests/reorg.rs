//! Integration test: block disconnection, journal pruning and persistence.

use proptest::prelude::*;
use std::path::PathBuf;
use tessera_core::SettlementConfig;
use tessera_integration_tests::*;
use tessera_settlement::{Claimant, OverlayError, Predicate, SettlementIndex, SettlementOverlay};
use tessera_store::Store;

fn overlay() -> SettlementOverlay {
    SettlementOverlay::new(SettlementConfig::default())
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tessera-reorg-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_disconnect_erases_open_and_update() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    let empty_root = overlay.state_root();

    let open = open_channel_tx(1, &a, &b, 1_000_000);
    let id = channel_id_of(&open);
    let hash = block_hash(1);
    overlay
        .connect_block(
            hash,
            1,
            &[open, update_channel_tx(2, id, [600_000, 400_000], 1, &a, &b)],
        )
        .unwrap();
    assert!(overlay.channel(&id).is_some());

    overlay.disconnect_block(&hash).unwrap();
    assert!(overlay.channel(&id).is_none());
    assert!(!overlay.snapshot().is_closed(&id));
    assert_eq!(*overlay.snapshot(), SettlementIndex::new());
    assert_eq!(overlay.state_root(), empty_root);
    assert!(overlay.journal().is_empty());
}

#[test]
fn test_disconnect_restores_prior_block_state() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    let open = open_channel_tx(1, &a, &b, 9_000);
    let id = channel_id_of(&open);
    overlay.connect_block(block_hash(1), 1, &[open]).unwrap();
    overlay
        .connect_block(
            block_hash(2),
            2,
            &[update_channel_tx(2, id, [1_000, 8_000], 1, &a, &b)],
        )
        .unwrap();
    let after_update = overlay.snapshot();

    let channel = overlay.channel(&id).unwrap().clone();
    overlay
        .connect_block(block_hash(3), 3, &[close_channel_tx(&channel)])
        .unwrap();
    assert!(overlay.snapshot().is_closed(&id));

    overlay.disconnect_block(&block_hash(3)).unwrap();
    assert_eq!(overlay.snapshot(), after_update);
    assert_eq!(overlay.channel(&id).unwrap().nonce, 1);

    overlay.disconnect_block(&block_hash(2)).unwrap();
    let channel = overlay.channel(&id).unwrap();
    assert_eq!(channel.nonce, 0);
    assert_eq!(channel.balances, [9_000, 0]);
}

#[test]
fn test_disconnect_restores_claimed_balance() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let create = create_claimable_tx(1, 25, vec![Claimant::new(x, Predicate::Unconditional)]);
    let id = claimable_id_of(&create);
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();
    let created = overlay.claimable(&id).unwrap().clone();

    overlay
        .connect_block(block_hash(2), 2, &[claim_tx(&create, &x, 25, None)])
        .unwrap();
    overlay.disconnect_block(&block_hash(2)).unwrap();
    assert_eq!(overlay.claimable(&id), Some(&created));
}

#[test]
fn test_disconnect_must_follow_connect_order() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    overlay
        .connect_block(block_hash(1), 1, &[open_channel_tx(1, &a, &b, 10)])
        .unwrap();
    overlay
        .connect_block(block_hash(2), 2, &[open_channel_tx(2, &a, &b, 20)])
        .unwrap();

    let err = overlay.disconnect_block(&block_hash(1)).unwrap_err();
    assert!(matches!(err, OverlayError::OutOfOrderUndo { .. }));
    assert!(err.is_internal());

    let err = overlay.disconnect_block(&block_hash(7)).unwrap_err();
    assert!(matches!(err, OverlayError::MissingUndoJournal(_)));
    assert_eq!(overlay.snapshot().channel_count(), 2);
}

#[test]
fn test_pruned_block_cannot_be_disconnected() {
    let mut overlay = SettlementOverlay::new(SettlementConfig {
        journal_retention: 2,
        ..SettlementConfig::default()
    });
    for n in 1..=4 {
        overlay.connect_block(block_hash(n), n, &[]).unwrap();
    }
    let pruned = overlay.prune_journal(4);
    assert_eq!(pruned.len(), 2);
    assert_eq!(overlay.journal().len(), 2);

    overlay.disconnect_block(&block_hash(4)).unwrap();
    overlay.disconnect_block(&block_hash(3)).unwrap();
    assert!(matches!(
        overlay.disconnect_block(&block_hash(2)),
        Err(OverlayError::MissingUndoJournal(_))
    ));
}

#[test]
fn test_store_follows_connect_disconnect_and_prune() {
    let dir = temp_dir();
    let (a, b) = (alice(), bob());

    {
        let store = Store::open(&dir).unwrap();
        let mut overlay = overlay();
        let open = open_channel_tx(1, &a, &b, 3_000);
        let id = channel_id_of(&open);
        store
            .apply(&overlay.connect_block(block_hash(1), 1, &[open]).unwrap())
            .unwrap();
        store
            .apply(
                &overlay
                    .connect_block(
                        block_hash(2),
                        2,
                        &[update_channel_tx(2, id, [1_500, 1_500], 1, &a, &b)],
                    )
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(store.get_channel(&id).unwrap().map(|c| c.nonce), Some(1));
    }

    // Restart: rebuild the overlay from disk and roll back the tip.
    let store = Store::open(&dir).unwrap();
    let (index, journal) = store.load().unwrap();
    assert_eq!(journal.len(), 2);
    let mut overlay = SettlementOverlay::from_parts(SettlementConfig::default(), index, journal);
    store
        .apply(&overlay.disconnect_block(&block_hash(2)).unwrap())
        .unwrap();

    let (index, journal) = store.load().unwrap();
    assert_eq!(index, *overlay.snapshot());
    assert_eq!(&journal, overlay.journal());
    assert_eq!(index.channels().next().map(|c| c.nonce), Some(0));

    store.apply(&overlay.prune_journal(1 + 288)).unwrap();
    let (_, journal) = store.load().unwrap();
    assert!(journal.is_empty());

    drop(store);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_lower_height_block_rejected_and_reload_keeps_tip() {
    let dir = temp_dir();
    let (a, b) = (alice(), bob());
    let store = Store::open(&dir).unwrap();
    let mut overlay = overlay();

    store
        .apply(
            &overlay
                .connect_block(block_hash(0xaa), 10, &[open_channel_tx(1, &a, &b, 10)])
                .unwrap(),
        )
        .unwrap();
    let err = overlay
        .connect_block(block_hash(0xbb), 3, &[open_channel_tx(2, &a, &b, 10)])
        .unwrap_err();
    assert!(matches!(
        err,
        OverlayError::NonIncreasingHeight {
            height: 3,
            tip_height: 10,
            ..
        }
    ));
    store
        .apply(
            &overlay
                .connect_block(block_hash(0xbb), 11, &[open_channel_tx(2, &a, &b, 10)])
                .unwrap(),
        )
        .unwrap();

    let (index, journal) = store.load().unwrap();
    assert_eq!(
        journal.tip().map(|e| e.block_hash),
        overlay.journal().tip().map(|e| e.block_hash)
    );
    let mut reloaded = SettlementOverlay::from_parts(SettlementConfig::default(), index, journal);
    reloaded.disconnect_block(&block_hash(0xbb)).unwrap();
    reloaded.disconnect_block(&block_hash(0xaa)).unwrap();
    assert_eq!(*reloaded.snapshot(), SettlementIndex::new());

    drop(store);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_disconnect_same_block_open_and_close() {
    let mut overlay = overlay();
    let (a, b) = (alice(), bob());
    let open = open_channel_tx(1, &a, &b, 4_000);
    let id = channel_id_of(&open);

    // Channel as committed by the open alone.
    let mut scratch = self::overlay();
    scratch.connect_block(block_hash(1), 1, &[open.clone()]).unwrap();
    let channel = scratch.channel(&id).unwrap().clone();

    overlay
        .connect_block(block_hash(1), 1, &[open, close_channel_tx(&channel)])
        .unwrap();
    assert!(overlay.snapshot().is_closed(&id));

    overlay.disconnect_block(&block_hash(1)).unwrap();
    assert!(overlay.channel(&id).is_none());
    assert!(!overlay.snapshot().is_closed(&id));
    assert_eq!(*overlay.snapshot(), SettlementIndex::new());
}

#[test]
fn test_disconnect_same_block_create_and_claim() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let create = create_claimable_tx(1, 90, vec![Claimant::new(x, Predicate::Unconditional)]);
    let id = claimable_id_of(&create);

    overlay
        .connect_block(block_hash(1), 1, &[create.clone(), claim_tx(&create, &x, 90, None)])
        .unwrap();
    assert!(overlay.claimable(&id).is_none());

    overlay.disconnect_block(&block_hash(1)).unwrap();
    assert!(overlay.claimable(&id).is_none());
    assert_eq!(*overlay.snapshot(), SettlementIndex::new());
    assert!(overlay.journal().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Connecting a run of update blocks and disconnecting them all returns
    /// the index to its state right after the channel was opened.
    #[test]
    fn disconnecting_every_block_restores_the_open_state(
        splits in prop::collection::vec(0u64..=1_000, 1..8),
    ) {
        let mut overlay = overlay();
        let (a, b) = (alice(), bob());
        let open = open_channel_tx(1, &a, &b, 1_000);
        let id = channel_id_of(&open);
        overlay.connect_block(block_hash(1), 1, &[open]).unwrap();
        let opened = overlay.snapshot();
        let opened_root = overlay.state_root();

        for (i, split) in splits.iter().enumerate() {
            let n = i as u64 + 2;
            let tx = update_channel_tx(100 + n, id, [*split, 1_000 - split], n - 1, &a, &b);
            overlay.connect_block(block_hash(n), n, &[tx]).unwrap();
        }

        for i in (0..splits.len()).rev() {
            overlay.disconnect_block(&block_hash(i as u64 + 2)).unwrap();
        }
        let restored = overlay.snapshot();
        prop_assert_eq!(&restored, &opened);
        prop_assert_eq!(overlay.state_root(), opened_root);
        prop_assert_eq!(overlay.journal().len(), 1);
    }
}
