//! Reconciliation engine - matches manually recorded payments against bank statements.

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;
