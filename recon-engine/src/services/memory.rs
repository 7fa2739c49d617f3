//! In-process reference store.
//!
//! Backs the integration tests and embedders that have not wired a remote
//! persistence service yet. Enforces the same contract a production store
//! must: reconciled payments never reappear as candidates, and a second
//! reconcile commit for the same payment is rejected as a conflict.

use crate::error::EngineError;
use crate::models::{
    BankAccount, NewPayment, Payment, PaymentStatus, ReconciliationSession, SessionEvent,
    SessionState,
};
use crate::services::metrics::STORE_OP_DURATION;
use crate::services::store::PaymentStore;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, BankAccount>,
    payments: HashMap<Uuid, Payment>,
    sessions: HashMap<Uuid, ReconciliationSession>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a bank account; the engine resolves statement currency from it.
    #[instrument(skip(self))]
    pub async fn register_bank_account(
        &self,
        bank_name: &str,
        account_number_masked: &str,
        currency: &str,
    ) -> BankAccount {
        let account = BankAccount {
            bank_account_id: Uuid::new_v4(),
            bank_name: bank_name.to_string(),
            account_number_masked: account_number_masked.to_string(),
            currency: currency.to_string(),
            created_utc: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner
            .accounts
            .insert(account.bank_account_id, account.clone());
        info!(bank_account_id = %account.bank_account_id, "Bank account registered");
        account
    }

    /// Update a payment's own lifecycle status. Candidate listing only
    /// returns completed payments.
    pub async fn set_payment_status(&self, payment_id: Uuid, status: PaymentStatus) -> bool {
        let mut inner = self.inner.write().await;
        match inner.payments.get_mut(&payment_id) {
            Some(payment) => {
                payment.status = status.as_str().to_string();
                true
            }
            None => false,
        }
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Option<Payment> {
        self.inner.read().await.payments.get(&payment_id).cloned()
    }

    pub async fn get_session(&self, session_id: Uuid) -> Option<ReconciliationSession> {
        self.inner.read().await.sessions.get(&session_id).cloned()
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    #[instrument(skip(self, new_payment), fields(customer_id = %new_payment.customer_id))]
    async fn record_manual_payment(
        &self,
        new_payment: NewPayment,
    ) -> Result<Payment, EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["record_manual_payment"])
            .start_timer();

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            customer_id: new_payment.customer_id,
            invoice_id: new_payment.invoice_id,
            amount: new_payment.amount,
            currency: new_payment.currency,
            payment_date: new_payment.payment_date,
            method: new_payment.method,
            receipt_ref: new_payment.receipt_ref,
            notes: new_payment.notes,
            status: PaymentStatus::Completed.as_str().to_string(),
            reconciled: false,
            created_utc: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner.payments.insert(payment.payment_id, payment.clone());

        timer.observe_duration();
        info!(payment_id = %payment.payment_id, "Payment recorded");

        Ok(payment)
    }

    #[instrument(skip(self))]
    async fn list_unreconciled_payments(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<Payment>, EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["list_unreconciled_payments"])
            .start_timer();

        let inner = self.inner.read().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| {
                !p.reconciled
                    && PaymentStatus::from_str(&p.status) == PaymentStatus::Completed
                    && p.payment_date >= period_start
                    && p.payment_date <= period_end
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            a.payment_date
                .cmp(&b.payment_date)
                .then(a.payment_id.cmp(&b.payment_id))
        });

        timer.observe_duration();
        Ok(payments)
    }

    #[instrument(skip(self), fields(bank_account_id = %bank_account_id))]
    async fn get_bank_account(
        &self,
        bank_account_id: Uuid,
    ) -> Result<Option<BankAccount>, EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["get_bank_account"])
            .start_timer();

        let account = self
            .inner
            .read()
            .await
            .accounts
            .get(&bank_account_id)
            .cloned();

        timer.observe_duration();
        Ok(account)
    }

    #[instrument(skip(self), fields(bank_account_id = %bank_account_id))]
    async fn start_session(
        &self,
        bank_account_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
        statement_balance: Decimal,
        currency: &str,
        created_by_user_id: &str,
        notes: Option<&str>,
    ) -> Result<ReconciliationSession, EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["start_session"])
            .start_timer();

        let mut inner = self.inner.write().await;
        if !inner.accounts.contains_key(&bank_account_id) {
            return Err(EngineError::NotFound(anyhow::anyhow!(
                "bank account {} does not exist",
                bank_account_id
            )));
        }

        let session = ReconciliationSession {
            session_id: Uuid::new_v4(),
            bank_account_id,
            period_start,
            period_end,
            statement_balance,
            currency: currency.to_string(),
            selected_payment_ids: Vec::new(),
            matched_total: Decimal::ZERO,
            state: SessionState::Matching.as_str().to_string(),
            created_by_user_id: created_by_user_id.to_string(),
            notes: notes.map(|n| n.to_string()),
            created_utc: Utc::now(),
            completed_utc: None,
        };
        inner.sessions.insert(session.session_id, session.clone());

        timer.observe_duration();
        info!(session_id = %session.session_id, "Reconciliation session started");

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %session_id, payment_id = %payment_id))]
    async fn mark_payment_reconciled(
        &self,
        session_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["mark_payment_reconciled"])
            .start_timer();

        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&session_id) {
            return Err(EngineError::NotFound(anyhow::anyhow!(
                "session {} does not exist",
                session_id
            )));
        }
        let payment = inner.payments.get_mut(&payment_id).ok_or_else(|| {
            EngineError::NotFound(anyhow::anyhow!("payment {} does not exist", payment_id))
        })?;

        // Optimistic-concurrency guard: a payment reconciled by another
        // session must not be committed twice.
        if payment.reconciled {
            return Err(EngineError::ConcurrencyConflict(payment_id));
        }
        payment.reconciled = true;

        timer.observe_duration();
        info!("Payment marked reconciled");

        Ok(())
    }

    #[instrument(skip(self, selected_payment_ids), fields(session_id = %session_id))]
    async fn complete_session(
        &self,
        session_id: Uuid,
        selected_payment_ids: &[Uuid],
        matched_total: Decimal,
        notes: Option<&str>,
    ) -> Result<ReconciliationSession, EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["complete_session"])
            .start_timer();

        let mut inner = self.inner.write().await;
        let session = inner.sessions.get_mut(&session_id).ok_or_else(|| {
            EngineError::NotFound(anyhow::anyhow!("session {} does not exist", session_id))
        })?;

        let state = SessionState::from_str(&session.state);
        if state.is_terminal() {
            return Err(EngineError::InvalidTransition {
                state,
                event: SessionEvent::Complete,
            });
        }

        session.selected_payment_ids = selected_payment_ids.to_vec();
        session.matched_total = matched_total;
        session.state = SessionState::Completed.as_str().to_string();
        session.completed_utc = Some(Utc::now());
        if let Some(n) = notes {
            session.notes = Some(n.to_string());
        }
        let session = session.clone();

        timer.observe_duration();
        info!(
            matched_total = %session.matched_total,
            discrepancy = %session.discrepancy(),
            "Session completed"
        );

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn cancel_session(&self, session_id: Uuid) -> Result<(), EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["cancel_session"])
            .start_timer();

        let mut inner = self.inner.write().await;
        let session = inner.sessions.get_mut(&session_id).ok_or_else(|| {
            EngineError::NotFound(anyhow::anyhow!("session {} does not exist", session_id))
        })?;

        let state = SessionState::from_str(&session.state);
        if state.is_terminal() {
            return Err(EngineError::InvalidTransition {
                state,
                event: SessionEvent::Cancel,
            });
        }
        session.state = SessionState::Cancelled.as_str().to_string();

        timer.observe_duration();
        info!("Session cancelled");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_sessions(
        &self,
        bank_account_id: Option<Uuid>,
    ) -> Result<Vec<ReconciliationSession>, EngineError> {
        let timer = STORE_OP_DURATION
            .with_label_values(&["list_sessions"])
            .start_timer();

        let inner = self.inner.read().await;
        let mut sessions: Vec<ReconciliationSession> = inner
            .sessions
            .values()
            .filter(|s| bank_account_id.map_or(true, |id| s.bank_account_id == id))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_utc);

        timer.observe_duration();
        Ok(sessions)
    }
}
