use anyhow::Result;
use dotenvy::dotenv;

use icolor::cli::{Cli, Commands};
use icolor::core::web_server::{create_router, WebState};
use icolor::core::{config, init_logger, log_startup_configuration, metrics, Settings};
use icolor::storage::{open_ledger, remaining_days, SubscriptionLedger, SubscriptionStatus};
use icolor::telegram::{create_bot, run_polling, run_webhook, setup_bot_commands, HandlerDeps};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, ledger, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger(config::LOG_FILE_PATH.as_deref())?;

    let settings = Settings::from_env()?;
    let ledger = open_ledger(settings.redis_url.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bot(settings, ledger).await,
        Commands::Grant { user_id, days } => {
            let days = days.unwrap_or(settings.sub_days);
            if ledger.backend() == "memory" {
                log::warn!("REDIS_URL is not set; this grant only lives as long as this process");
            }
            let record = ledger.grant(user_id, days).await?;
            println!(
                "Granted {} days to {}; active until {}",
                days,
                user_id,
                record.expires_at.to_rfc3339()
            );
            Ok(())
        }
        Commands::Status { user_id } => {
            let status = ledger.status(user_id).await?;
            println!("{}", describe_status(user_id, &status, &ledger));
            Ok(())
        }
    }
}

fn describe_status(user_id: i64, status: &SubscriptionStatus, ledger: &SubscriptionLedger) -> String {
    match status {
        SubscriptionStatus::Never => format!("{}: no subscription", user_id),
        SubscriptionStatus::Active { expires_at } => format!(
            "{}: active until {} ({} days left)",
            user_id,
            expires_at.to_rfc3339(),
            remaining_days(*expires_at, ledger.now())
        ),
        SubscriptionStatus::Expired { expired_at } => {
            format!("{}: expired at {}", user_id, expired_at.to_rfc3339())
        }
    }
}

/// Runs the bot and the HTTP server until ctrl-c.
async fn run_bot(settings: Settings, ledger: SubscriptionLedger) -> Result<()> {
    log_startup_configuration(&settings);
    metrics::init_metrics();

    match ledger.ping().await {
        Ok(()) => log::info!("✅ Ledger store '{}' reachable", ledger.backend()),
        Err(e) => log::warn!("⚠️  Ledger store '{}' not reachable yet: {}", ledger.backend(), e),
    }

    let bot = create_bot(settings.require_bot_token()?)?;

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let web_app = create_router(WebState::from_settings(ledger.clone(), &settings));
    let deps = HandlerDeps::new(ledger);

    match settings.webhook_url() {
        Some(raw) => {
            let url = url::Url::parse(&raw).map_err(|e| anyhow::anyhow!("Invalid webhook URL {}: {}", raw, e))?;
            run_webhook(bot, deps, web_app, settings.port, url).await
        }
        None => run_polling(bot, deps, web_app, settings.port).await,
    }
}
