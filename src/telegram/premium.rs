//! MODO GOD: the premium flag gated by the subscription ledger.
//!
//! The flag is only honoured while the user's subscription is active. When
//! the ledger cannot be reached the user is treated as not premium.

use dashmap::DashMap;

use crate::core::metrics;
use crate::storage::{LedgerError, SubscriptionLedger, SubscriptionStatus};

/// Per-user MODO GOD switches.
#[derive(Debug, Default)]
pub struct GodModeRegistry {
    flags: DashMap<i64, bool>,
}

impl GodModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, user_id: i64) -> bool {
        self.flags.get(&user_id).map(|flag| *flag).unwrap_or(false)
    }

    /// Flips the switch and returns the new value.
    pub fn toggle(&self, user_id: i64) -> bool {
        let mut entry = self.flags.entry(user_id).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn clear(&self, user_id: i64) {
        self.flags.remove(&user_id);
    }
}

/// Premium eligibility as the bot sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Premium(SubscriptionStatus),
    NotPremium(SubscriptionStatus),
    /// Ledger unreachable; treated as not premium
    Unknown,
}

impl Eligibility {
    pub fn is_premium(&self) -> bool {
        matches!(self, Eligibility::Premium(_))
    }
}

/// Consults the ledger, failing closed.
pub async fn check_eligibility(ledger: &SubscriptionLedger, user_id: i64) -> Eligibility {
    match ledger.status(user_id).await {
        Ok(status) if status.is_active() => {
            metrics::record_premium_check("active");
            Eligibility::Premium(status)
        }
        Ok(status) => {
            metrics::record_premium_check("inactive");
            Eligibility::NotPremium(status)
        }
        Err(e) => {
            log_ledger_failure(user_id, &e);
            metrics::record_premium_check("unavailable");
            Eligibility::Unknown
        }
    }
}

fn log_ledger_failure(user_id: i64, err: &LedgerError) {
    log::warn!("Premium check for user {} failed closed: {}", user_id, err);
    metrics::record_ledger_error("read");
}

/// Result of a /god request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GodToggle {
    Enabled,
    Disabled,
    RequiresSubscription(SubscriptionStatus),
    Unavailable,
}

pub async fn toggle_god_mode(ledger: &SubscriptionLedger, registry: &GodModeRegistry, user_id: i64) -> GodToggle {
    match check_eligibility(ledger, user_id).await {
        Eligibility::Premium(_) => {
            if registry.toggle(user_id) {
                GodToggle::Enabled
            } else {
                GodToggle::Disabled
            }
        }
        Eligibility::NotPremium(status) => {
            registry.clear(user_id);
            GodToggle::RequiresSubscription(status)
        }
        Eligibility::Unknown => GodToggle::Unavailable,
    }
}

/// The switch as it applies right now: set and backed by an active subscription.
pub async fn effective_god_mode(ledger: &SubscriptionLedger, registry: &GodModeRegistry, user_id: i64) -> bool {
    registry.is_set(user_id) && check_eligibility(ledger, user_id).await.is_premium()
}
