//! Error taxonomy for the reconciliation engine.

use crate::models::{SessionEvent, SessionState};
use thiserror::Error;
use uuid::Uuid;

/// One failed per-payment commit inside a `complete()` batch.
#[derive(Debug, Clone)]
pub struct CommitFailure {
    pub payment_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing operator input. Always recoverable locally.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An event fired against a session in a state that forbids it.
    /// Indicates a caller bug or stale UI state.
    #[error("Invalid transition: event '{event}' not allowed in state '{state}'")]
    InvalidTransition {
        state: SessionState,
        event: SessionEvent,
    },

    /// Selected payments do not share the statement's currency.
    #[error("Currency mismatch: statement currency is {expected}, selection includes {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// One or more per-payment commits failed during `complete()`. The
    /// session stays in review; `failed` lists exactly the payments to
    /// retry. Payments that committed before the failure are not
    /// re-committed on retry.
    #[error("Partial commit: {}/{attempted} payments failed", .failed.len())]
    PartialCommit {
        attempted: usize,
        failed: Vec<CommitFailure>,
    },

    /// A payment was reconciled by another session between candidate
    /// listing and commit.
    #[error("Concurrency conflict: payment {0} is already reconciled")]
    ConcurrencyConflict(Uuid),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl EngineError {
    /// Stable label for the error counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::CurrencyMismatch { .. } => "currency_mismatch",
            Self::PartialCommit { .. } => "partial_commit",
            Self::ConcurrencyConflict(_) => "concurrency_conflict",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
        }
    }
}
