//! Subscription storage: the ledger and its backing stores

pub mod clock;
pub mod ledger;
pub mod memory;
pub mod redis;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{
    remaining_days, GrantOutcome, LedgerError, LedgerStore, SubscriptionLedger, SubscriptionRecord, SubscriptionStatus,
};
pub use memory::MemoryLedgerStore;
pub use self::redis::RedisLedgerStore;

use std::sync::Arc;

/// Builds the ledger for the configured store: Redis when a URL is given,
/// memory otherwise.
pub fn open_ledger(redis_url: Option<&str>) -> Result<SubscriptionLedger, LedgerError> {
    let store: Arc<dyn LedgerStore> = match redis_url {
        Some(url) => Arc::new(RedisLedgerStore::open(url)?),
        None => Arc::new(MemoryLedgerStore::new()),
    };
    Ok(SubscriptionLedger::new(store, Arc::new(SystemClock)))
}
