//! Metrics collection using Prometheus
//!
//! Tracks payment notifications, ledger writes and failures, and premium
//! eligibility checks. Exposed on `/metrics` by the web server.

#![allow(clippy::unwrap_used)]

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec, TextEncoder};

lazy_static! {
    /// Payment webhook deliveries
    /// Labels: status (paid/pending/...), outcome (granted/duplicate/ignored/rejected/unavailable)
    pub static ref PAYMENT_NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "icolor_payment_notifications_total",
        "Payment webhook deliveries by reported status and handling outcome",
        &["status", "outcome"]
    )
    .unwrap();

    /// Ledger operations that failed
    /// Labels: operation (grant/read/ping)
    pub static ref LEDGER_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "icolor_ledger_errors_total",
        "Subscription ledger operations that failed",
        &["operation"]
    )
    .unwrap();

    /// Ledger retries by attempt number
    pub static ref LEDGER_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "icolor_ledger_retries_total",
        "Retries of ledger operations by attempt number",
        &["attempt"]
    )
    .unwrap();

    /// Premium eligibility checks made by the bot
    /// Labels: result (active/inactive/unavailable)
    pub static ref PREMIUM_CHECKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "icolor_premium_checks_total",
        "Premium eligibility checks by result",
        &["result"]
    )
    .unwrap();

    /// Bot commands received
    pub static ref COMMANDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "icolor_commands_total",
        "Bot commands received",
        &["command"]
    )
    .unwrap();
}

/// Forces registration of every metric so they appear on the first scrape.
pub fn init_metrics() {
    lazy_static::initialize(&PAYMENT_NOTIFICATIONS_TOTAL);
    lazy_static::initialize(&LEDGER_ERRORS_TOTAL);
    lazy_static::initialize(&LEDGER_RETRIES_TOTAL);
    lazy_static::initialize(&PREMIUM_CHECKS_TOTAL);
    lazy_static::initialize(&COMMANDS_TOTAL);
}

/// Renders the default registry in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    TextEncoder::new().encode_to_string(&prometheus::gather())
}

pub fn record_payment(status: &str, outcome: &str) {
    PAYMENT_NOTIFICATIONS_TOTAL.with_label_values(&[status, outcome]).inc();
}

pub fn record_ledger_error(operation: &str) {
    LEDGER_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn record_premium_check(result: &str) {
    PREMIUM_CHECKS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_command(command: &str) {
    COMMANDS_TOTAL.with_label_values(&[command]).inc();
}
