//! Manual payment intake: validation and normalization of method-specific
//! input into a payment creation payload.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::{NewPayment, Payment, PaymentMethod};
use crate::services::store::PaymentStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{info, instrument};

/// Raw operator input for one manual payment. Amount arrives as text so
/// unparsable values are rejected here rather than coerced upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: String,
    pub currency: Option<String>,
    pub payment_date: NaiveDate,
    #[serde(flatten)]
    pub method: PaymentMethod,
    pub receipt_ref: Option<String>,
    pub notes: Option<String>,
}

/// Blank optional strings are treated as absent, not stored as "".
fn normalize_opt(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn validate_currency(code: &str) -> Result<String, EngineError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EngineError::Validation(format!(
            "currency must be a 3-letter code, got '{}'",
            code
        )));
    }
    Ok(code.to_ascii_uppercase())
}

fn validate_method(method: PaymentMethod) -> Result<PaymentMethod, EngineError> {
    match method {
        PaymentMethod::Cash => Ok(PaymentMethod::Cash),
        PaymentMethod::Check {
            check_number,
            bank_name,
        } => {
            let check_number = check_number.trim().to_string();
            let bank_name = bank_name.trim().to_string();
            if check_number.is_empty() {
                return Err(EngineError::Validation(
                    "check payments require a check_number".to_string(),
                ));
            }
            if bank_name.is_empty() {
                return Err(EngineError::Validation(
                    "check payments require a bank_name".to_string(),
                ));
            }
            Ok(PaymentMethod::Check {
                check_number,
                bank_name,
            })
        }
        PaymentMethod::BankTransfer { receiving_account } => Ok(PaymentMethod::BankTransfer {
            receiving_account: normalize_opt(receiving_account),
        }),
        PaymentMethod::MobileMoney {
            provider,
            sender_phone,
        } => {
            let provider = provider.trim().to_string();
            let sender_phone = sender_phone.trim().to_string();
            if provider.is_empty() {
                return Err(EngineError::Validation(
                    "mobile money payments require a provider".to_string(),
                ));
            }
            if sender_phone.is_empty() {
                return Err(EngineError::Validation(
                    "mobile money payments require a sender_phone".to_string(),
                ));
            }
            Ok(PaymentMethod::MobileMoney {
                provider,
                sender_phone,
            })
        }
    }
}

/// Validate operator input and produce a normalized payment creation
/// payload. Pure; the persistence call belongs to the store.
pub fn build_payment(input: PaymentInput, base_currency: &str) -> Result<NewPayment, EngineError> {
    let customer_id = input.customer_id.trim().to_string();
    if customer_id.is_empty() {
        return Err(EngineError::Validation(
            "customer_id must not be empty".to_string(),
        ));
    }

    // Decimal has no NaN or infinity, so parse success implies a finite amount.
    let amount = Decimal::from_str(input.amount.trim()).map_err(|_| {
        EngineError::Validation(format!(
            "amount must be a decimal number, got '{}'",
            input.amount
        ))
    })?;
    if amount <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "amount must be positive, got '{}'",
            amount
        )));
    }

    let currency = match normalize_opt(input.currency) {
        Some(code) => validate_currency(&code)?,
        None => base_currency.to_string(),
    };

    Ok(NewPayment {
        customer_id,
        invoice_id: normalize_opt(input.invoice_id),
        amount,
        currency,
        payment_date: input.payment_date,
        method: validate_method(input.method)?,
        receipt_ref: normalize_opt(input.receipt_ref),
        notes: normalize_opt(input.notes),
    })
}

/// Validate, normalize and persist one manual payment.
#[instrument(skip(store, config, input), fields(customer_id = %input.customer_id))]
pub async fn record_manual_payment(
    store: &dyn PaymentStore,
    config: &EngineConfig,
    input: PaymentInput,
) -> Result<Payment, EngineError> {
    let new_payment = build_payment(input, &config.base_currency)?;
    let payment = store.record_manual_payment(new_payment).await?;
    info!(
        payment_id = %payment.payment_id,
        method = payment.method.as_str(),
        amount = %payment.amount,
        currency = %payment.currency,
        "Manual payment recorded"
    );
    Ok(payment)
}
