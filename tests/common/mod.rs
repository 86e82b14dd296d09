//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use icolor::storage::ledger::Extension;
use icolor::storage::{LedgerError, LedgerStore, ManualClock, MemoryLedgerStore, SubscriptionLedger};

/// 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000;

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(T0, 0).unwrap()
}

/// Memory ledger on a clock the test controls.
pub fn memory_ledger() -> (SubscriptionLedger, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = SubscriptionLedger::new(Arc::new(MemoryLedgerStore::new()), clock.clone());
    (ledger, clock)
}

/// Store that refuses every call as if the backend were down.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicU32,
}

impl FailingStore {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> LedgerError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        LedgerError::Unavailable("connection refused".to_string())
    }
}

#[async_trait]
impl LedgerStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn extend(
        &self,
        _user_id: i64,
        _now: i64,
        _add_secs: i64,
        _event_id: Option<&str>,
    ) -> Result<Extension, LedgerError> {
        Err(self.fail())
    }

    async fn load(&self, _user_id: i64) -> Result<Option<i64>, LedgerError> {
        Err(self.fail())
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Err(self.fail())
    }
}

pub fn failing_ledger() -> (SubscriptionLedger, Arc<FailingStore>) {
    let store = Arc::new(FailingStore::default());
    let ledger = SubscriptionLedger::new(store.clone(), Arc::new(ManualClock::new(t0())));
    (ledger, store)
}
