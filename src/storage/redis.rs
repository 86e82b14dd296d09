//! Redis-backed ledger store.
//!
//! Expiries live under `icolor:sub:<user_id>` as decimal unix seconds.
//! `extend` runs as one Lua script, so concurrent payment notifications for
//! the same user serialize inside Redis and none of them is lost.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, Script};
use tokio::sync::Mutex;

use super::ledger::{Extension, LedgerError, LedgerStore};
use crate::core::config;

/// KEYS[1] expiry key, KEYS[2] optional event key.
/// ARGV[1] now, ARGV[2] seconds to add, ARGV[3] event TTL.
/// Returns {applied, expires_at} with expires_at 0 when nothing is stored.
const EXTEND_SCRIPT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '') or 0
if #KEYS > 1 then
    if not redis.call('SET', KEYS[2], '1', 'NX', 'EX', ARGV[3]) then
        return {0, current}
    end
end
local now = tonumber(ARGV[1])
local base = current
if now > base then
    base = now
end
local expires = base + tonumber(ARGV[2])
redis.call('SET', KEYS[1], string.format('%d', expires))
return {1, expires}
";

pub struct RedisLedgerStore {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    extend_script: Script,
}

impl RedisLedgerStore {
    /// Parses the URL; no connection is made until the first operation.
    pub fn open(url: &str) -> Result<Self, LedgerError> {
        let client = redis::Client::open(url).map_err(|e| LedgerError::Backend(format!("invalid REDIS_URL: {}", e)))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            extend_script: Script::new(EXTEND_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, LedgerError> {
        let mut cached = self.conn.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            config::redis::connect_timeout(),
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| LedgerError::Unavailable("timed out connecting to redis".to_string()))?
        .map_err(classify)?;

        log::info!("Connected to redis ledger store");
        *cached = Some(conn.clone());
        Ok(conn)
    }

    /// Maps the error and drops the cached connection if it is broken.
    async fn fail(&self, err: RedisError) -> LedgerError {
        let mapped = classify(err);
        if matches!(mapped, LedgerError::Unavailable(_)) {
            log::warn!("Dropping redis connection after failure: {}", mapped);
            *self.conn.lock().await = None;
        }
        mapped
    }
}

fn record_key(user_id: i64) -> String {
    format!("{}{}", config::subscription::RECORD_KEY_PREFIX, user_id)
}

fn event_key(event_id: &str) -> String {
    format!("{}{}", config::subscription::EVENT_KEY_PREFIX, event_id)
}

fn classify(err: RedisError) -> LedgerError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        LedgerError::Unavailable(err.to_string())
    } else {
        LedgerError::Backend(err.to_string())
    }
}

#[async_trait]
impl LedgerStore for RedisLedgerStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn extend(
        &self,
        user_id: i64,
        now: i64,
        add_secs: i64,
        event_id: Option<&str>,
    ) -> Result<Extension, LedgerError> {
        let mut conn = self.connection().await?;

        let mut invocation = self.extend_script.prepare_invoke();
        invocation.key(record_key(user_id));
        if let Some(event) = event_id {
            invocation.key(event_key(event));
        }
        invocation
            .arg(now)
            .arg(add_secs)
            .arg(config::subscription::EVENT_DEDUP_TTL_SECS);

        let (applied, expires_at): (i64, i64) = match invocation.invoke_async(&mut conn).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail(e).await),
        };

        Ok(Extension {
            expires_at: (expires_at != 0).then_some(expires_at),
            applied: applied == 1,
        })
    }

    async fn load(&self, user_id: i64) -> Result<Option<i64>, LedgerError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match conn.get(record_key(user_id)).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(e).await),
        };

        raw.map(|value| {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| LedgerError::CorruptRecord { user_id, value })
        })
        .transpose()
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        let mut conn = self.connection().await?;
        let result: Result<String, RedisError> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(record_key(123456789), "icolor:sub:123456789");
        assert_eq!(event_key("pay_1"), "icolor:event:pay_1");
    }

    #[test]
    fn test_open_rejects_garbage_url() {
        assert!(matches!(RedisLedgerStore::open("not a url"), Err(LedgerError::Backend(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Port 1 is reserved and refuses connections on any sane host.
        let store = RedisLedgerStore::open("redis://127.0.0.1:1/").unwrap();
        assert!(matches!(store.ping().await, Err(LedgerError::Unavailable(_))));
    }
}
