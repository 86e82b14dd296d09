//! iColor - Telegram bot with payment-driven subscriptions
//!
//! A payment provider posts notifications to the HTTP server; paid
//! notifications extend the user's access in the subscription ledger, and
//! the bot consults the ledger before enabling premium behavior.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, metrics, retry, payments and the HTTP server
//! - `storage`: the subscription ledger and its Redis/memory stores
//! - `telegram`: bot commands, the MODO GOD gate and update delivery

pub mod cli;
pub mod core;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult, Settings};
pub use storage::{open_ledger, SubscriptionLedger, SubscriptionRecord, SubscriptionStatus};
