//! Integration tests for candidate selection and discrepancy arithmetic.

mod common;

use common::{date, record_payment, spawn_store, start_engine};
use recon_engine::error::EngineError;
use recon_engine::models::PaymentStatus;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn candidate_set_filters_by_status_and_period() {
    let (store, account) = spawn_store().await;
    let on_start = record_payment(&store, "10.00", date(2024, 1, 1), "USD").await;
    let on_end = record_payment(&store, "20.00", date(2024, 1, 31), "USD").await;
    let outside = record_payment(&store, "30.00", date(2024, 2, 1), "USD").await;
    let pending = record_payment(&store, "40.00", date(2024, 1, 15), "USD").await;
    store
        .set_payment_status(pending.payment_id, PaymentStatus::Pending)
        .await;

    let engine = start_engine(
        store,
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "0.00",
    )
    .await;

    let ids: Vec<Uuid> = engine.candidates().iter().map(|p| p.payment_id).collect();
    // Period bounds are inclusive; non-completed payments are not candidates.
    assert!(ids.contains(&on_start.payment_id));
    assert!(ids.contains(&on_end.payment_id));
    assert!(!ids.contains(&outside.payment_id));
    assert!(!ids.contains(&pending.payment_id));
}

#[tokio::test]
async fn toggle_maintains_total_incrementally() {
    let (store, account) = spawn_store().await;
    let p1 = record_payment(&store, "500.00", date(2024, 1, 5), "USD").await;
    let p2 = record_payment(&store, "600.00", date(2024, 1, 12), "USD").await;
    let p3 = record_payment(&store, "400.00", date(2024, 1, 20), "USD").await;

    let mut engine = start_engine(
        store,
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "1500.00",
    )
    .await;

    // Toggle sequence with re-toggles; only final membership matters.
    for id in [
        p1.payment_id,
        p2.payment_id,
        p1.payment_id,
        p3.payment_id,
        p2.payment_id,
        p2.payment_id,
    ] {
        engine.toggle(id).unwrap();
    }
    assert!(!engine.is_selected(p1.payment_id));
    assert!(engine.is_selected(p2.payment_id));
    assert!(engine.is_selected(p3.payment_id));

    // Incremental accumulation must equal full resummation of the set.
    let resummed: Decimal = engine
        .candidates()
        .iter()
        .filter(|p| engine.is_selected(p.payment_id))
        .map(|p| p.amount)
        .sum();
    assert_eq!(engine.selected_total(), resummed);
    assert_eq!(engine.selected_total(), dec("1000.00"));
    assert_eq!(engine.discrepancy(), dec("500.00"));
}

#[tokio::test]
async fn toggle_unknown_payment_is_validation_error() {
    let (store, account) = spawn_store().await;
    let mut engine = start_engine(
        store,
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "0.00",
    )
    .await;

    let err = engine.toggle(Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn balanced_session_completes_and_reconciles_all_selected() {
    let (store, account) = spawn_store().await;
    let p1 = record_payment(&store, "500.00", date(2024, 1, 5), "USD").await;
    let p2 = record_payment(&store, "600.00", date(2024, 1, 12), "USD").await;
    let p3 = record_payment(&store, "400.00", date(2024, 1, 20), "USD").await;

    let mut engine = start_engine(
        store.clone(),
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "1500.00",
    )
    .await;

    engine.toggle(p1.payment_id).unwrap();
    engine.toggle(p2.payment_id).unwrap();
    engine.toggle(p3.payment_id).unwrap();

    assert_eq!(engine.selected_total(), dec("1500.00"));
    assert_eq!(engine.discrepancy(), Decimal::ZERO);
    assert!(engine.is_balanced());

    engine.proceed_to_review().unwrap();
    let session = engine.complete(None).await.unwrap();

    assert_eq!(session.state, "completed");
    assert_eq!(session.matched_total, dec("1500.00"));
    assert_eq!(session.discrepancy(), Decimal::ZERO);
    assert!(session.completed_utc.is_some());

    for id in [p1.payment_id, p2.payment_id, p3.payment_id] {
        assert!(store.get_payment(id).await.unwrap().reconciled);
    }
}

#[tokio::test]
async fn non_zero_discrepancy_is_reported_but_does_not_block_completion() {
    let (store, account) = spawn_store().await;
    let p1 = record_payment(&store, "500.00", date(2024, 1, 5), "USD").await;
    let p2 = record_payment(&store, "600.00", date(2024, 1, 12), "USD").await;
    let p3 = record_payment(&store, "400.00", date(2024, 1, 20), "USD").await;

    let mut engine = start_engine(
        store.clone(),
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "1500.00",
    )
    .await;

    engine.toggle(p1.payment_id).unwrap();
    engine.toggle(p2.payment_id).unwrap();

    assert_eq!(engine.selected_total(), dec("1100.00"));
    assert_eq!(engine.discrepancy(), dec("400.00"));
    assert!(!engine.is_balanced());

    engine.proceed_to_review().unwrap();
    let session = engine.complete(Some("short statement")).await.unwrap();

    assert_eq!(session.discrepancy(), dec("400.00"));
    assert!(store.get_payment(p1.payment_id).await.unwrap().reconciled);
    assert!(store.get_payment(p2.payment_id).await.unwrap().reconciled);
    assert!(!store.get_payment(p3.payment_id).await.unwrap().reconciled);
}

#[tokio::test]
async fn currency_mismatch_blocks_review() {
    let (store, account) = spawn_store().await;
    let usd = record_payment(&store, "100.00", date(2024, 1, 5), "USD").await;
    let eur = record_payment(&store, "50.00", date(2024, 1, 6), "EUR").await;

    let mut engine = start_engine(
        store,
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "150.00",
    )
    .await;

    engine.toggle(usd.payment_id).unwrap();
    engine.toggle(eur.payment_id).unwrap();

    let err = engine.proceed_to_review().unwrap_err();
    match err {
        EngineError::CurrencyMismatch { expected, found } => {
            assert_eq!(expected, "USD");
            assert_eq!(found, "EUR");
        }
        other => panic!("expected CurrencyMismatch, got {:?}", other),
    }

    // Deselecting the offending payment unblocks review.
    engine.toggle(eur.payment_id).unwrap();
    engine.proceed_to_review().unwrap();
}

#[tokio::test]
async fn reconciled_payments_never_reappear_as_candidates() {
    let (store, account) = spawn_store().await;
    let p1 = record_payment(&store, "500.00", date(2024, 1, 5), "USD").await;
    let p2 = record_payment(&store, "600.00", date(2024, 1, 12), "USD").await;

    let mut engine = start_engine(
        store.clone(),
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "500.00",
    )
    .await;
    engine.toggle(p1.payment_id).unwrap();
    engine.proceed_to_review().unwrap();
    engine.complete(None).await.unwrap();

    // New session over an overlapping period: the committed payment is gone.
    let next = start_engine(
        store,
        &account,
        date(2024, 1, 1),
        date(2024, 2, 29),
        "600.00",
    )
    .await;
    let ids: Vec<Uuid> = next.candidates().iter().map(|p| p.payment_id).collect();
    assert!(!ids.contains(&p1.payment_id));
    assert!(ids.contains(&p2.payment_id));
}

#[tokio::test]
async fn refresh_prunes_selections_reconciled_elsewhere() {
    let (store, account) = spawn_store().await;
    let p1 = record_payment(&store, "500.00", date(2024, 1, 5), "USD").await;
    let p2 = record_payment(&store, "600.00", date(2024, 1, 12), "USD").await;

    let mut engine_b = start_engine(
        store.clone(),
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "1100.00",
    )
    .await;
    engine_b.toggle(p1.payment_id).unwrap();
    engine_b.toggle(p2.payment_id).unwrap();
    assert_eq!(engine_b.selected_total(), dec("1100.00"));

    // Another session wins the race on p1.
    let mut engine_a = start_engine(
        store.clone(),
        &account,
        date(2024, 1, 1),
        date(2024, 1, 31),
        "500.00",
    )
    .await;
    engine_a.toggle(p1.payment_id).unwrap();
    engine_a.proceed_to_review().unwrap();
    engine_a.complete(None).await.unwrap();

    engine_b.refresh_candidates().await.unwrap();
    assert!(!engine_b.is_selected(p1.payment_id));
    assert!(engine_b.is_selected(p2.payment_id));
    assert_eq!(engine_b.selected_total(), dec("600.00"));
    assert_eq!(engine_b.discrepancy(), dec("500.00"));
}
