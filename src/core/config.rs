use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

use crate::core::error::{AppError, AppResult};

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Empty or unset means console-only logging
pub static LOG_FILE_PATH: Lazy<Option<String>> = Lazy::new(|| non_empty(env::var("LOG_FILE_PATH").ok()));

/// Default HTTP port when PORT is not set
pub const DEFAULT_PORT: u16 = 8080;

/// Default Telegram webhook path segment
pub const DEFAULT_TG_PATH: &str = "tg";

/// Subscription configuration
pub mod subscription {
    /// Days granted per paid notification when SUB_DAYS is not set
    pub const DEFAULT_SUB_DAYS: i64 = 30;

    /// Longest single grant (100 years); also the upper bound for SUB_DAYS
    pub const MAX_GRANT_DAYS: i64 = 36_500;

    /// Redis key prefix for subscription expiry records
    pub const RECORD_KEY_PREFIX: &str = "icolor:sub:";

    /// Redis key prefix for processed payment events
    pub const EVENT_KEY_PREFIX: &str = "icolor:event:";

    /// How long a processed payment event id is remembered (90 days)
    pub const EVENT_DEDUP_TTL_SECS: u64 = 90 * 86_400;
}

/// Redis configuration
pub mod redis {
    use super::Duration;

    /// Timeout for establishing a Redis connection (in seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 5;

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Telegram Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Retry configuration
pub mod retry {
    /// Retries for a ledger write triggered by a payment notification
    pub const LEDGER_MAX_RETRIES: u32 = 2;

    /// Initial backoff for ledger retries (in milliseconds)
    pub const LEDGER_INITIAL_DELAY_MS: u64 = 200;

    /// Cap on a single ledger retry delay (in milliseconds)
    pub const LEDGER_MAX_DELAY_MS: u64 = 2_000;
}

/// Runtime settings resolved from the environment.
///
/// Aliases are checked in order and the first non-empty value wins, so
/// `BOT_TOKEN` takes priority over `TELEGRAM_TOKEN`, `WEBHOOK_URL` over
/// `PUBLIC_URL` and `WEBHOOK_PATH` over `TG_PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bot_token: Option<String>,
    pub public_url: Option<String>,
    pub webhook_path: String,
    pub port: u16,
    pub redis_url: Option<String>,
    pub sub_days: i64,
    pub payment_secret: Option<String>,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| non_empty(lookup(key)));

        let port = match first(&["PORT"]) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got {:?}", raw)))?,
            None => DEFAULT_PORT,
        };

        let sub_days = match first(&["SUB_DAYS"]) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(days) if (1..=subscription::MAX_GRANT_DAYS).contains(&days) => days,
                _ => {
                    return Err(AppError::Config(format!(
                        "SUB_DAYS must be an integer between 1 and {}, got {:?}",
                        subscription::MAX_GRANT_DAYS,
                        raw
                    )))
                }
            },
            None => subscription::DEFAULT_SUB_DAYS,
        };

        let webhook_path = first(&["WEBHOOK_PATH", "TG_PATH"])
            .map(|path| path.trim_matches('/').to_string())
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_TG_PATH.to_string());

        Ok(Self {
            bot_token: first(&["BOT_TOKEN", "TELEGRAM_TOKEN"]),
            public_url: first(&["WEBHOOK_URL", "PUBLIC_URL"]),
            webhook_path,
            port,
            redis_url: first(&["REDIS_URL"]),
            sub_days,
            payment_secret: first(&["PAYMENT_WEBHOOK_SECRET"]),
        })
    }

    /// Full URL Telegram should deliver updates to, if a public URL is configured.
    pub fn webhook_url(&self) -> Option<String> {
        self.public_url
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), self.webhook_path))
    }

    /// Returns the bot token or a configuration error naming both variables.
    pub fn require_bot_token(&self) -> AppResult<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| AppError::Config("BOT_TOKEN (or TELEGRAM_TOKEN) is not set".to_string()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
