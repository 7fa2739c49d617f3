//! Cross-session reporting. Read-only; tolerates an empty session set.

use crate::error::EngineError;
use crate::models::{ReconciliationSession, ReconciliationSummary, SessionState};
use crate::services::store::PaymentStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

/// Aggregate statistics over a set of sessions. Discrepancy figures cover
/// completed sessions only; zero completed sessions yield zero averages,
/// never a division error.
pub fn summarize(sessions: &[ReconciliationSession]) -> ReconciliationSummary {
    let completed: Vec<&ReconciliationSession> = sessions
        .iter()
        .filter(|s| SessionState::from_str(&s.state) == SessionState::Completed)
        .collect();

    let total_discrepancy: Decimal = completed.iter().map(|s| s.discrepancy()).sum();
    let average_discrepancy = if completed.is_empty() {
        Decimal::ZERO
    } else {
        total_discrepancy / Decimal::from(completed.len() as u64)
    };

    ReconciliationSummary {
        total_sessions: sessions.len() as u64,
        completed_sessions: completed.len() as u64,
        average_discrepancy,
        total_discrepancy,
    }
}

/// Summary over the store's sessions, optionally narrowed to one bank
/// account and/or to sessions whose period overlaps a filter window.
#[instrument(skip(store))]
pub async fn session_summary(
    store: &dyn PaymentStore,
    bank_account_id: Option<Uuid>,
    period: Option<(NaiveDate, NaiveDate)>,
) -> Result<ReconciliationSummary, EngineError> {
    let mut sessions = store.list_sessions(bank_account_id).await?;
    if let Some((filter_start, filter_end)) = period {
        sessions.retain(|s| s.period_start <= filter_end && s.period_end >= filter_start);
    }
    Ok(summarize(&sessions))
}
