//! Persistence boundary for the reconciliation engine.
//!
//! The engine owns no storage; payments, bank accounts and sessions live in
//! an external collaborator behind this trait. Implementations must reject
//! a reconcile commit for a payment that is already reconciled, so a race
//! between two sessions surfaces as a per-payment conflict rather than a
//! double count.

use crate::error::EngineError;
use crate::models::{BankAccount, NewPayment, Payment, ReconciliationSession};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a validated manual payment. The stored payment starts
    /// unreconciled with status `completed`.
    async fn record_manual_payment(&self, new_payment: NewPayment)
        -> Result<Payment, EngineError>;

    /// Completed, not-yet-reconciled payments dated within the inclusive
    /// period. All method types are included; callers narrow by account
    /// themselves if they want to.
    async fn list_unreconciled_payments(
        &self,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<Payment>, EngineError>;

    async fn get_bank_account(
        &self,
        bank_account_id: Uuid,
    ) -> Result<Option<BankAccount>, EngineError>;

    #[allow(clippy::too_many_arguments)]
    async fn start_session(
        &self,
        bank_account_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
        statement_balance: Decimal,
        currency: &str,
        created_by_user_id: &str,
        notes: Option<&str>,
    ) -> Result<ReconciliationSession, EngineError>;

    /// Mark one payment reconciled on behalf of a session. Must fail with
    /// `ConcurrencyConflict` if the payment is already reconciled, and the
    /// failure must leave the payment untouched.
    async fn mark_payment_reconciled(
        &self,
        session_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), EngineError>;

    /// Finalize a session after all selected payments committed.
    async fn complete_session(
        &self,
        session_id: Uuid,
        selected_payment_ids: &[Uuid],
        matched_total: Decimal,
        notes: Option<&str>,
    ) -> Result<ReconciliationSession, EngineError>;

    async fn cancel_session(&self, session_id: Uuid) -> Result<(), EngineError>;

    /// Sessions for summary reporting, optionally narrowed to one account.
    async fn list_sessions(
        &self,
        bank_account_id: Option<Uuid>,
    ) -> Result<Vec<ReconciliationSession>, EngineError>;
}
