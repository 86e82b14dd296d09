//! Subscription ledger: user id → access expiry, advanced by payments.
//!
//! `grant` sets `expires_at = max(current expires_at, now) + duration`, so a
//! payment always extends remaining access and never shortens it. Stores do
//! the read-modify-write atomically; this type owns the clock and the
//! day/second arithmetic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use super::clock::{Clock, SystemClock};
use super::memory::MemoryLedgerStore;
use crate::core::config::subscription::MAX_GRANT_DAYS;

const SECS_PER_DAY: i64 = 86_400;

/// Ledger failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Backing store cannot be reached (connection refused, dropped, timed out)
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Store answered but rejected the operation
    #[error("ledger backend error: {0}")]
    Backend(String),

    /// Grant duration must be between 1 and `MAX_GRANT_DAYS` days
    #[error("invalid grant duration: {0} days")]
    InvalidDuration(i64),

    /// Stored value is not a unix timestamp
    #[error("corrupt subscription record for user {user_id}: {value:?}")]
    CorruptRecord { user_id: i64, value: String },
}

/// Result of an atomic extension in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    /// Expiry after the call, unix seconds; `None` when nothing is stored
    pub expires_at: Option<i64>,
    /// False when the event id had already been applied
    pub applied: bool,
}

/// Persistence for expiry timestamps (unix seconds).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Atomically sets `max(current, now) + add_secs`. When `event_id` is
    /// given and was seen before, leaves the record untouched.
    async fn extend(
        &self,
        user_id: i64,
        now: i64,
        add_secs: i64,
        event_id: Option<&str>,
    ) -> Result<Extension, LedgerError>;

    async fn load(&self, user_id: i64) -> Result<Option<i64>, LedgerError>;

    async fn ping(&self) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionRecord {
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Subscription state as seen at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// No payment ever recorded
    Never,
    Active { expires_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
}

impl SubscriptionStatus {
    pub fn from_record(record: Option<&SubscriptionRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => SubscriptionStatus::Never,
            Some(r) if r.is_active_at(now) => SubscriptionStatus::Active {
                expires_at: r.expires_at,
            },
            Some(r) => SubscriptionStatus::Expired {
                expired_at: r.expires_at,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active { .. })
    }
}

/// Outcome of a grant tied to a payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantOutcome {
    pub record: Option<SubscriptionRecord>,
    pub applied: bool,
}

/// Process-wide handle to the ledger. Cheap to clone.
#[derive(Clone)]
pub struct SubscriptionLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionLedger {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Memory-backed ledger on the wall clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLedgerStore::new()), Arc::new(SystemClock))
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Extends access for `user_id` by `duration_days` from the later of now
    /// and the current expiry.
    pub async fn grant(&self, user_id: i64, duration_days: i64) -> Result<SubscriptionRecord, LedgerError> {
        let outcome = self.extend(user_id, duration_days, None).await?;
        outcome
            .record
            .ok_or_else(|| LedgerError::Backend(format!("grant for user {} stored no record", user_id)))
    }

    /// Like [`grant`](Self::grant), but a repeated `event_id` is a no-op.
    pub async fn grant_for_event(
        &self,
        user_id: i64,
        duration_days: i64,
        event_id: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        self.extend(user_id, duration_days, Some(event_id)).await
    }

    pub async fn record(&self, user_id: i64) -> Result<Option<SubscriptionRecord>, LedgerError> {
        self.store
            .load(user_id)
            .await?
            .map(|secs| to_record(user_id, secs))
            .transpose()
    }

    pub async fn status(&self, user_id: i64) -> Result<SubscriptionStatus, LedgerError> {
        let record = self.record(user_id).await?;
        Ok(SubscriptionStatus::from_record(record.as_ref(), self.now()))
    }

    /// `now <= expires_at`; false when the user never paid.
    pub async fn is_active(&self, user_id: i64) -> Result<bool, LedgerError> {
        Ok(self.status(user_id).await?.is_active())
    }

    pub async fn ping(&self) -> Result<(), LedgerError> {
        self.store.ping().await
    }

    async fn extend(
        &self,
        user_id: i64,
        duration_days: i64,
        event_id: Option<&str>,
    ) -> Result<GrantOutcome, LedgerError> {
        if !(1..=MAX_GRANT_DAYS).contains(&duration_days) {
            return Err(LedgerError::InvalidDuration(duration_days));
        }
        let add_secs = duration_days * SECS_PER_DAY;

        // Expiries past chrono's range would be written and then never read back
        let now = self.now();
        now.checked_add_signed(Duration::seconds(add_secs))
            .ok_or(LedgerError::InvalidDuration(duration_days))?;
        let now = now.timestamp();
        let ext = self.store.extend(user_id, now, add_secs, event_id).await?;
        let record = ext.expires_at.map(|secs| to_record(user_id, secs)).transpose()?;

        match (&record, ext.applied) {
            (Some(r), true) => log::info!(
                "Subscription extended: user_id={}, days={}, expires_at={}",
                user_id,
                duration_days,
                r.expires_at
            ),
            (_, false) => log::info!(
                "Duplicate payment event ignored: user_id={}, event_id={:?}",
                user_id,
                event_id
            ),
            (None, true) => {}
        }

        Ok(GrantOutcome {
            record,
            applied: ext.applied,
        })
    }
}

fn to_record(user_id: i64, secs: i64) -> Result<SubscriptionRecord, LedgerError> {
    DateTime::from_timestamp(secs, 0)
        .map(|expires_at| SubscriptionRecord { user_id, expires_at })
        .ok_or_else(|| LedgerError::CorruptRecord {
            user_id,
            value: secs.to_string(),
        })
}

/// Remaining access, rounded down to whole days; zero once expired.
pub fn remaining_days(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).max(Duration::zero()).num_days()
}
