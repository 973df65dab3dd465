//! Integration test: claimable balance creation and predicate-gated claims.

use tessera_core::SettlementConfig;
use tessera_integration_tests::*;
use tessera_settlement::{Claimant, Predicate, SettlementError, SettlementOverlay};

fn overlay() -> SettlementOverlay {
    SettlementOverlay::new(SettlementConfig::default())
}

#[test]
fn test_time_locked_claim() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();

    let create = create_claimable_tx(1, 500, vec![Claimant::new(x, Predicate::AfterHeight(1000))]);
    let id = claimable_id_of(&create);
    overlay.connect_block(block_hash(900), 900, &[create.clone()]).unwrap();
    let balance = overlay.claimable(&id).unwrap();
    assert_eq!(balance.amount, 500);
    assert_eq!(balance.created_at, 900);

    let err = overlay
        .connect_block(block_hash(950), 950, &[claim_tx(&create, &x, 500, None)])
        .unwrap_err();
    assert_eq!(
        err.settlement_error(),
        Some(&SettlementError::PredicateNotSatisfied {
            claimable: id,
            height: 950
        })
    );
    assert!(overlay.claimable(&id).is_some());

    overlay
        .connect_block(block_hash(1000), 1000, &[claim_tx(&create, &x, 500, None)])
        .unwrap();
    assert!(overlay.claimable(&id).is_none());
    assert_eq!(overlay.snapshot().claimable_count(), 0);
}

#[test]
fn test_hash_locked_claim() {
    let mut overlay = overlay();
    let y = party(0x22).party_key();

    let create = create_claimable_tx(2, 500, vec![Claimant::new(y, Predicate::hash_of(b"secret"))]);
    let id = claimable_id_of(&create);
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();

    let err = overlay
        .connect_block(block_hash(2), 2, &[claim_tx(&create, &y, 500, Some(b"wrong"))])
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::PredicateNotSatisfied { .. })
    ));

    overlay
        .connect_block(block_hash(2), 2, &[claim_tx(&create, &y, 500, Some(b"secret"))])
        .unwrap();
    assert!(overlay.claimable(&id).is_none());
}

#[test]
fn test_claim_is_one_shot() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let create = create_claimable_tx(3, 40, vec![Claimant::new(x, Predicate::Unconditional)]);
    let id = claimable_id_of(&create);
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();
    overlay
        .connect_block(block_hash(2), 2, &[claim_tx(&create, &x, 40, None)])
        .unwrap();

    let err = overlay
        .connect_block(block_hash(3), 3, &[claim_tx(&create, &x, 40, None)])
        .unwrap_err();
    assert_eq!(
        err.settlement_error(),
        Some(&SettlementError::UnknownClaimable(id))
    );
}

#[test]
fn test_other_eligible_claimant_cannot_claim_after_first() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let y = party(0x22).party_key();
    let create = create_claimable_tx(
        10,
        60,
        vec![
            Claimant::new(x, Predicate::Unconditional),
            Claimant::new(y, Predicate::Unconditional),
        ],
    );
    let id = claimable_id_of(&create);
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();

    // Same block: X then Y.
    let err = overlay
        .connect_block(
            block_hash(2),
            2,
            &[claim_tx(&create, &x, 60, None), claim_tx(&create, &y, 60, None)],
        )
        .unwrap_err();
    assert_eq!(
        err.settlement_error(),
        Some(&SettlementError::UnknownClaimable(id))
    );
    assert!(overlay.claimable(&id).is_some());

    // Later block: X claims, then Y tries.
    overlay
        .connect_block(block_hash(2), 2, &[claim_tx(&create, &x, 60, None)])
        .unwrap();
    let err = overlay
        .connect_block(block_hash(3), 3, &[claim_tx(&create, &y, 60, None)])
        .unwrap_err();
    assert_eq!(
        err.settlement_error(),
        Some(&SettlementError::UnknownClaimable(id))
    );
}

#[test]
fn test_double_claim_in_one_block_rejected() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let create = create_claimable_tx(4, 40, vec![Claimant::new(x, Predicate::Unconditional)]);
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();

    let claim = claim_tx(&create, &x, 40, None);
    let err = overlay
        .connect_block(block_hash(2), 2, &[claim.clone(), claim])
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::UnknownClaimable(_))
    ));
    // The whole block is dropped, so the balance is still claimable.
    assert!(overlay.claimable(&claimable_id_of(&create)).is_some());
}

#[test]
fn test_only_first_matching_claimant_is_evaluated() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let create = create_claimable_tx(
        5,
        70,
        vec![
            Claimant::new(x, Predicate::AfterHeight(1_000)),
            Claimant::new(x, Predicate::Unconditional),
        ],
    );
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();

    let err = overlay
        .connect_block(block_hash(2), 2, &[claim_tx(&create, &x, 70, None)])
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::PredicateNotSatisfied { .. })
    ));
}

#[test]
fn test_stranger_cannot_claim() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let stranger = party(0x99).party_key();
    let create = create_claimable_tx(6, 70, vec![Claimant::new(x, Predicate::Unconditional)]);
    let id = claimable_id_of(&create);
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();

    let err = overlay
        .connect_block(block_hash(2), 2, &[claim_tx(&create, &stranger, 70, None)])
        .unwrap_err();
    assert_eq!(
        err.settlement_error(),
        Some(&SettlementError::NoMatchingClaimant {
            claimable: id,
            claimer: stranger
        })
    );
}

#[test]
fn test_claimant_limits() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();

    let crowd = (0..11)
        .map(|_| Claimant::new(x, Predicate::Unconditional))
        .collect();
    let err = overlay
        .connect_block(block_hash(1), 1, &[create_claimable_tx(7, 10, crowd)])
        .unwrap_err();
    assert_eq!(
        err.settlement_error(),
        Some(&SettlementError::TooManyClaimants { count: 11, max: 10 })
    );

    let deep = Predicate::not(Predicate::not(Predicate::not(Predicate::not(
        Predicate::Unconditional,
    ))));
    let err = overlay
        .connect_block(
            block_hash(1),
            1,
            &[create_claimable_tx(8, 10, vec![Claimant::new(x, deep)])],
        )
        .unwrap_err();
    assert!(matches!(
        err.settlement_error(),
        Some(SettlementError::PredicateTooDeep { max: 4, .. })
    ));
}

#[test]
fn test_compound_predicate_window() {
    let mut overlay = overlay();
    let x = party(0x11).party_key();
    let window = Predicate::and(Predicate::AfterHeight(10), Predicate::BeforeHeight(20));
    let create = create_claimable_tx(9, 5, vec![Claimant::new(x, window)]);
    overlay.connect_block(block_hash(1), 1, &[create.clone()]).unwrap();

    for height in [5, 20, 25] {
        assert!(overlay
            .connect_block(block_hash(height), height, &[claim_tx(&create, &x, 5, None)])
            .is_err());
    }
    overlay
        .connect_block(block_hash(15), 15, &[claim_tx(&create, &x, 5, None)])
        .unwrap();
}
