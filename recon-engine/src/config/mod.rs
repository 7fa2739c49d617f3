//! Configuration module for recon-engine.

use crate::error::EngineError;
use std::env;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Currency assumed for payments recorded without one.
    pub base_currency: String,
    pub log_level: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, EngineError> {
        let base_currency = env::var("BASE_CURRENCY").unwrap_or_else(|_| "USD".to_string());
        if base_currency.len() != 3 || !base_currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::Config(anyhow::anyhow!(
                "BASE_CURRENCY must be a 3-letter code, got '{}'",
                base_currency
            )));
        }

        Ok(Self {
            base_currency: base_currency.to_ascii_uppercase(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            log_level: "info".to_string(),
        }
    }
}
