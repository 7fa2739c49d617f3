//! Domain models for the reconciliation engine.

#![allow(clippy::should_implement_trait)]

use crate::error::EngineError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Bank Account Models
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub bank_account_id: Uuid,
    pub bank_name: String,
    pub account_number_masked: String,
    pub currency: String,
    pub created_utc: DateTime<Utc>,
}

// ============================================================================
// Payment Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            _ => Self::Pending,
        }
    }
}

/// Method-specific payment data. Closed set; fields round-trip unchanged
/// through the store, the matching engine never inspects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check {
        check_number: String,
        bank_name: String,
    },
    BankTransfer {
        receiving_account: Option<String>,
    },
    MobileMoney {
        provider: String,
        sender_phone: String,
    },
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Check { .. } => "check",
            Self::BankTransfer { .. } => "bank_transfer",
            Self::MobileMoney { .. } => "mobile_money",
        }
    }
}

/// A manually recorded payment, the atomic unit of reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: NaiveDate,
    #[serde(flatten)]
    pub method: PaymentMethod,
    pub receipt_ref: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub reconciled: bool,
    pub created_utc: DateTime<Utc>,
}

/// Validated payment creation payload produced by the payment record model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: NaiveDate,
    #[serde(flatten)]
    pub method: PaymentMethod,
    pub receipt_ref: Option<String>,
    pub notes: Option<String>,
}

// ============================================================================
// Session Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Setup,
    Matching,
    Review,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Matching => "matching",
            Self::Review => "review",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "setup" => Self::Setup,
            "matching" => Self::Matching,
            "review" => Self::Review,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Setup,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Pure transition function. Encodes the legal state/event shape only;
    /// data guards (period order, non-empty selection, currency) live with
    /// the session engine.
    pub fn apply(self, event: SessionEvent) -> Result<SessionState, EngineError> {
        use SessionEvent::*;
        use SessionState::*;
        match (self, event) {
            (Setup, Start) => Ok(Matching),
            (Matching, ToggleSelect) => Ok(Matching),
            (Matching, Refresh) => Ok(Matching),
            (Matching, ProceedToReview) => Ok(Review),
            (Review, Complete) => Ok(Completed),
            (Review, BackToMatching) => Ok(Matching),
            (state, Cancel) if !state.is_terminal() => Ok(Cancelled),
            (state, event) => Err(EngineError::InvalidTransition { state, event }),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    ToggleSelect,
    Refresh,
    ProceedToReview,
    BackToMatching,
    Complete,
    Cancel,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ToggleSelect => "toggle_select",
            Self::Refresh => "refresh",
            Self::ProceedToReview => "proceed_to_review",
            Self::BackToMatching => "back_to_matching",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reconciliation attempt for a bank account over a date period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationSession {
    pub session_id: Uuid,
    pub bank_account_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub statement_balance: Decimal,
    pub currency: String,
    pub selected_payment_ids: Vec<Uuid>,
    pub matched_total: Decimal,
    pub state: String,
    pub created_by_user_id: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub completed_utc: Option<DateTime<Utc>>,
}

impl ReconciliationSession {
    /// Absolute difference between the statement balance and the matched
    /// total. Meaningful for completed sessions; in-progress sessions have
    /// a zero matched total until commit.
    pub fn discrepancy(&self) -> Decimal {
        (self.statement_balance - self.matched_total).abs()
    }
}

// ============================================================================
// Summary Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub average_discrepancy: Decimal,
    pub total_discrepancy: Decimal,
}

impl ReconciliationSummary {
    pub fn empty() -> Self {
        Self {
            total_sessions: 0,
            completed_sessions: 0,
            average_discrepancy: Decimal::ZERO,
            total_discrepancy: Decimal::ZERO,
        }
    }
}
