//! Telegram bot: commands, recommendations, the MODO GOD gate and update delivery

pub mod bot;
pub mod handlers;
pub mod premium;
pub mod recommend;
pub mod runner;
pub mod session;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use premium::{check_eligibility, effective_god_mode, toggle_god_mode, Eligibility, GodModeRegistry, GodToggle};
pub use recommend::{recommend, recommend_with_god, Recommendation, RiskMode, Side, Spin};
pub use runner::{run_polling, run_webhook, shutdown_signal};
pub use session::SessionRegistry;
