//! Logging initialization and startup diagnostics
//!
//! Code logs through the `log` facade; records are bridged into a
//! `tracing-subscriber` pipeline that writes to the console and, when
//! configured, to a log file.

use anyhow::Result;
use std::fs::File;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::core::config::Settings;

/// Default filter when RUST_LOG is not set
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Initialize logger for console and optional file output
///
/// # Arguments
/// * `log_file_path` - Optional path to the log file (truncated on start)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger is already installed
pub fn init_logger(log_file_path: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = match log_file_path {
        Some(path) => {
            let file = File::create(path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer);

    tracing_log::LogTracer::init().map_err(|e| anyhow::anyhow!("Failed to bridge log records: {}", e))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the resolved configuration at application startup, without secrets.
pub fn log_startup_configuration(settings: &Settings) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🎛️ iColor configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if settings.bot_token.is_some() {
        log::info!("✅ BOT_TOKEN: set");
    } else {
        log::warn!("⚠️  BOT_TOKEN: not set (bot cannot start)");
    }

    match settings.webhook_url() {
        Some(url) => log::info!("🌐 Telegram mode: webhook at {}", url),
        None => log::info!("📡 Telegram mode: long polling (no WEBHOOK_URL/PUBLIC_URL)"),
    }

    log::info!("🔌 HTTP port: {}", settings.port);

    match settings.redis_url {
        Some(_) => log::info!("🗄️  Ledger store: redis"),
        None => log::warn!("⚠️  REDIS_URL not set: subscriptions kept in memory and lost on restart"),
    }

    log::info!("📅 SUB_DAYS: {}", settings.sub_days);

    if settings.payment_secret.is_some() {
        log::info!("🔐 Payment webhook signature check: enabled");
    } else {
        log::warn!("⚠️  PAYMENT_WEBHOOK_SECRET not set: payment webhook is unauthenticated");
    }
}
