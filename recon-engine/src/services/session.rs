//! Reconciliation session driver: lifecycle state machine plus the
//! matching and discrepancy engine for one session.
//!
//! One operator drives one session interactively, so selection state lives
//! on this object and every toggle updates the running total in place
//! instead of re-summing the candidate set. Store calls are the only await
//! points; everything else runs on the caller's turn.

use crate::error::{CommitFailure, EngineError};
use crate::models::{Payment, ReconciliationSession, SessionEvent, SessionState};
use crate::services::metrics::{record_error, record_payment_commit, record_session_operation};
use crate::services::store::PaymentStore;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Operator input for opening a session. The statement balance arrives as
/// text and must parse as a decimal.
#[derive(Debug, Clone)]
pub struct StartSession {
    pub bank_account_id: Uuid,
    pub period_start: chrono::NaiveDate,
    pub period_end: chrono::NaiveDate,
    pub statement_balance: String,
    pub created_by_user_id: String,
    pub notes: Option<String>,
}

pub struct SessionEngine {
    store: Arc<dyn PaymentStore>,
    session: ReconciliationSession,
    state: SessionState,
    candidates: HashMap<Uuid, Payment>,
    candidate_order: Vec<Uuid>,
    selected: HashSet<Uuid>,
    selected_total: Decimal,
    /// Payments this session has already marked reconciled. Survives a
    /// partial-commit failure so retries never double-commit.
    committed: HashSet<Uuid>,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("session", &self.session)
            .field("state", &self.state)
            .field("candidates", &self.candidates)
            .field("candidate_order", &self.candidate_order)
            .field("selected", &self.selected)
            .field("selected_total", &self.selected_total)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    /// Open a session: validate the period and statement balance, resolve
    /// the bank account, persist the session and pull the candidate set.
    /// The session lands in `matching`.
    #[instrument(skip(store, req), fields(bank_account_id = %req.bank_account_id))]
    pub async fn start(
        store: Arc<dyn PaymentStore>,
        req: StartSession,
    ) -> Result<Self, EngineError> {
        if req.period_start > req.period_end {
            record_error("validation");
            return Err(EngineError::Validation(format!(
                "period_start {} is after period_end {}",
                req.period_start, req.period_end
            )));
        }

        let statement_balance =
            Decimal::from_str(req.statement_balance.trim()).map_err(|_| {
                record_error("validation");
                EngineError::Validation(format!(
                    "statement_balance must be a decimal number, got '{}'",
                    req.statement_balance
                ))
            })?;

        let account = store
            .get_bank_account(req.bank_account_id)
            .await?
            .ok_or_else(|| {
                record_error("not_found");
                EngineError::NotFound(anyhow::anyhow!(
                    "bank account {} does not exist",
                    req.bank_account_id
                ))
            })?;

        let state = SessionState::Setup.apply(SessionEvent::Start)?;

        let session = store
            .start_session(
                req.bank_account_id,
                req.period_start,
                req.period_end,
                statement_balance,
                &account.currency,
                &req.created_by_user_id,
                req.notes.as_deref(),
            )
            .await?;

        let mut engine = Self {
            store,
            session,
            state,
            candidates: HashMap::new(),
            candidate_order: Vec::new(),
            selected: HashSet::new(),
            selected_total: Decimal::ZERO,
            committed: HashSet::new(),
        };
        engine.load_candidates().await?;

        record_session_operation("start", "ok");
        info!(
            session_id = %engine.session.session_id,
            candidates = engine.candidate_order.len(),
            statement_balance = %statement_balance,
            "Session started"
        );

        Ok(engine)
    }

    async fn load_candidates(&mut self) -> Result<(), EngineError> {
        let payments = self
            .store
            .list_unreconciled_payments(self.session.period_start, self.session.period_end)
            .await?;

        self.candidate_order = payments.iter().map(|p| p.payment_id).collect();
        self.candidates = payments
            .into_iter()
            .map(|p| (p.payment_id, p))
            .collect();
        Ok(())
    }

    /// Re-pull the candidate set. Selections whose payments dropped out
    /// (reconciled elsewhere in the meantime) are pruned and their amounts
    /// subtracted from the running total.
    #[instrument(skip(self), fields(session_id = %self.session.session_id))]
    pub async fn refresh_candidates(&mut self) -> Result<(), EngineError> {
        self.state = self.state.apply(SessionEvent::Refresh)?;

        let previous = std::mem::take(&mut self.candidates);
        self.load_candidates().await?;

        let stale: Vec<Uuid> = self
            .selected
            .iter()
            .filter(|id| !self.candidates.contains_key(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(payment) = previous.get(&id) {
                self.selected_total -= payment.amount;
            }
            self.selected.remove(&id);
            warn!(payment_id = %id, "Selected payment no longer a candidate, deselected");
        }
        Ok(())
    }

    /// Candidate payments in stable listing order.
    pub fn candidates(&self) -> Vec<&Payment> {
        self.candidate_order
            .iter()
            .filter_map(|id| self.candidates.get(id))
            .collect()
    }

    /// Flip membership of one candidate in the selection. Returns whether
    /// the payment is selected afterwards. The running total is adjusted
    /// by the toggled amount, never re-summed.
    pub fn toggle(&mut self, payment_id: Uuid) -> Result<bool, EngineError> {
        self.state = self.state.apply(SessionEvent::ToggleSelect).map_err(|e| {
            record_error("invalid_transition");
            e
        })?;

        let payment = self.candidates.get(&payment_id).ok_or_else(|| {
            record_error("validation");
            EngineError::Validation(format!(
                "payment {} is not in the candidate set",
                payment_id
            ))
        })?;

        let now_selected = if self.selected.remove(&payment_id) {
            self.selected_total -= payment.amount;
            false
        } else {
            self.selected.insert(payment_id);
            self.selected_total += payment.amount;
            true
        };
        Ok(now_selected)
    }

    pub fn is_selected(&self, payment_id: Uuid) -> bool {
        self.selected.contains(&payment_id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn selected_total(&self) -> Decimal {
        self.selected_total
    }

    /// Absolute difference between the statement balance and the selected
    /// total. Exact decimal arithmetic, always non-negative.
    pub fn discrepancy(&self) -> Decimal {
        (self.session.statement_balance - self.selected_total).abs()
    }

    /// Exact equality; currency amounts are exact decimals so no epsilon
    /// is involved.
    pub fn is_balanced(&self) -> bool {
        self.discrepancy() == Decimal::ZERO
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &ReconciliationSession {
        &self.session
    }

    /// Move to review. A non-zero discrepancy does not block review (or
    /// completion); an empty selection or a currency mismatch does.
    pub fn proceed_to_review(&mut self) -> Result<(), EngineError> {
        let next = self.state.apply(SessionEvent::ProceedToReview).map_err(|e| {
            record_error("invalid_transition");
            e
        })?;

        if self.selected.is_empty() {
            record_error("validation");
            return Err(EngineError::Validation(
                "cannot review an empty selection".to_string(),
            ));
        }

        for id in &self.selected {
            if let Some(payment) = self.candidates.get(id) {
                if payment.currency != self.session.currency {
                    record_error("currency_mismatch");
                    return Err(EngineError::CurrencyMismatch {
                        expected: self.session.currency.clone(),
                        found: payment.currency.clone(),
                    });
                }
            }
        }

        self.state = next;
        record_session_operation("proceed_to_review", "ok");
        info!(
            session_id = %self.session.session_id,
            selected = self.selected.len(),
            selected_total = %self.selected_total,
            discrepancy = %self.discrepancy(),
            "Session moved to review"
        );
        Ok(())
    }

    /// Return from review for re-selection before commit.
    pub fn back_to_matching(&mut self) -> Result<(), EngineError> {
        self.state = self.state.apply(SessionEvent::BackToMatching).map_err(|e| {
            record_error("invalid_transition");
            e
        })?;
        record_session_operation("back_to_matching", "ok");
        Ok(())
    }

    /// Commit the session: mark every selected payment reconciled, then
    /// finalize. Commits are issued one per payment, at-least-once and
    /// idempotent; if any fail the session stays in review and the error
    /// lists exactly the failed payment ids. Payments committed before the
    /// failure are skipped on retry.
    #[instrument(skip(self, notes), fields(session_id = %self.session.session_id))]
    pub async fn complete(
        &mut self,
        notes: Option<&str>,
    ) -> Result<ReconciliationSession, EngineError> {
        let next = self.state.apply(SessionEvent::Complete).map_err(|e| {
            record_error("invalid_transition");
            e
        })?;

        let selected: Vec<Uuid> = self
            .candidate_order
            .iter()
            .filter(|id| self.selected.contains(id))
            .copied()
            .collect();

        let mut failed = Vec::new();
        for payment_id in &selected {
            if self.committed.contains(payment_id) {
                continue;
            }
            match self
                .store
                .mark_payment_reconciled(self.session.session_id, *payment_id)
                .await
            {
                Ok(()) => {
                    self.committed.insert(*payment_id);
                    record_payment_commit("ok");
                }
                Err(e) => {
                    record_payment_commit("failed");
                    warn!(payment_id = %payment_id, error = %e, "Payment commit failed");
                    failed.push(CommitFailure {
                        payment_id: *payment_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !failed.is_empty() {
            record_error("partial_commit");
            record_session_operation("complete", "partial_failure");
            warn!(
                failed = failed.len(),
                attempted = selected.len(),
                "Session commit incomplete, staying in review"
            );
            return Err(EngineError::PartialCommit {
                attempted: selected.len(),
                failed,
            });
        }

        let session = self
            .store
            .complete_session(
                self.session.session_id,
                &selected,
                self.selected_total,
                notes,
            )
            .await?;

        self.session = session.clone();
        self.state = next;
        record_session_operation("complete", "ok");
        info!(
            matched_total = %self.selected_total,
            discrepancy = %session.discrepancy(),
            "Session completed"
        );

        Ok(session)
    }

    /// Abandon the session from any non-terminal state. Payments already
    /// committed by a fully successful `complete` cannot be un-reconciled
    /// here.
    #[instrument(skip(self), fields(session_id = %self.session.session_id))]
    pub async fn cancel(&mut self) -> Result<(), EngineError> {
        let next = self.state.apply(SessionEvent::Cancel).map_err(|e| {
            record_error("invalid_transition");
            e
        })?;

        self.store.cancel_session(self.session.session_id).await?;
        self.state = next;
        self.session.state = next.as_str().to_string();
        record_session_operation("cancel", "ok");
        info!("Session cancelled");
        Ok(())
    }
}
