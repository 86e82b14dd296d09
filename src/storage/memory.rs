//! In-process ledger store. Used when REDIS_URL is absent and in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::ledger::{Extension, LedgerError, LedgerStore};
use crate::core::config::subscription::EVENT_DEDUP_TTL_SECS;

#[derive(Default)]
struct MemoryState {
    expiries: HashMap<i64, i64>,
    /// Event id → unix seconds it was first applied
    events: HashMap<String, i64>,
}

impl MemoryState {
    /// Forgets event ids older than the dedup TTL, as Redis expiry would.
    fn prune_events(&mut self, now: i64) {
        let ttl = i64::try_from(EVENT_DEDUP_TTL_SECS).unwrap_or(i64::MAX);
        self.events.retain(|_, seen_at| now.saturating_sub(*seen_at) < ttl);
    }
}

/// Map guarded by one async mutex, which makes `extend` atomic.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<MemoryState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn extend(
        &self,
        user_id: i64,
        now: i64,
        add_secs: i64,
        event_id: Option<&str>,
    ) -> Result<Extension, LedgerError> {
        let mut state = self.state.lock().await;
        let current = state.expiries.get(&user_id).copied();

        if let Some(event) = event_id {
            state.prune_events(now);
            if state.events.contains_key(event) {
                return Ok(Extension {
                    expires_at: current,
                    applied: false,
                });
            }
            state.events.insert(event.to_string(), now);
        }

        let expires_at = current.unwrap_or(now).max(now).saturating_add(add_secs);
        state.expiries.insert(user_id, expires_at);

        Ok(Extension {
            expires_at: Some(expires_at),
            applied: true,
        })
    }

    async fn load(&self, user_id: i64) -> Result<Option<i64>, LedgerError> {
        Ok(self.state.lock().await.expiries.get(&user_id).copied())
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
