//! Common test utilities for recon-engine integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use recon_engine::models::{BankAccount, Payment, PaymentMethod};
use recon_engine::services::{
    build_payment, MemoryStore, PaymentInput, PaymentStore, SessionEngine, StartSession,
};
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,recon_engine=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fresh in-memory store with one USD bank account.
pub async fn spawn_store() -> (Arc<MemoryStore>, BankAccount) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let account = store
        .register_bank_account("Test Bank", "****1234", "USD")
        .await;
    (store, account)
}

pub fn payment_input(customer_id: &str, amount: &str, payment_date: NaiveDate) -> PaymentInput {
    PaymentInput {
        customer_id: customer_id.to_string(),
        invoice_id: None,
        amount: amount.to_string(),
        currency: None,
        payment_date,
        method: PaymentMethod::Cash,
        receipt_ref: None,
        notes: None,
    }
}

/// Record one completed cash payment in the given currency.
pub async fn record_payment(
    store: &MemoryStore,
    amount: &str,
    payment_date: NaiveDate,
    currency: &str,
) -> Payment {
    let mut input = payment_input("cust-1", amount, payment_date);
    input.currency = Some(currency.to_string());
    let new_payment = build_payment(input, "USD").unwrap();
    store.record_manual_payment(new_payment).await.unwrap()
}

/// Open a session over the period, already in the matching state.
pub async fn start_engine(
    store: Arc<MemoryStore>,
    account: &BankAccount,
    period_start: NaiveDate,
    period_end: NaiveDate,
    statement_balance: &str,
) -> SessionEngine {
    SessionEngine::start(
        store,
        StartSession {
            bank_account_id: account.bank_account_id,
            period_start,
            period_end,
            statement_balance: statement_balance.to_string(),
            created_by_user_id: "op-1".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap()
}
