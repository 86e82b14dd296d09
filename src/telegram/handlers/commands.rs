//! Command handlers and the texts they reply with

use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode};
use teloxide::utils::command::BotCommands;

use super::types::HandlerDeps;
use crate::storage::{remaining_days, SubscriptionStatus};
use crate::telegram::bot::Command;
use crate::telegram::premium::{effective_god_mode, toggle_god_mode, GodToggle};
use crate::telegram::recommend::{recommend_with_god, Recommendation, RiskMode, Spin, Trigger};

/// Spins shown in the history line
const HISTORY_SHOWN: usize = 12;

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M UTC";

/// Telegram user id of the sender, falling back to the chat id.
pub fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(msg.chat.id.0)
}

pub fn welcome_text() -> String {
    "🎰 <b>Bem-vindo ao iColor!</b>\n\n\
     Registre cada giro com /vermelho, /preto ou /zero e eu mostro a próxima recomendação.\n\
     /modo alterna o perfil de risco e /reset limpa o histórico.\n\
     Use /status para ver sua assinatura.\n\
     Assinantes podem ligar o <b>MODO GOD</b> com /god: análise agressiva com a recomendação invertida.\n\n\
     ⚠️ <i>Heurísticas recreativas. Não há vantagem garantida em RNG.</i>"
        .to_string()
}

pub fn status_text(status: &SubscriptionStatus, now: DateTime<Utc>) -> String {
    match status {
        SubscriptionStatus::Never => "ℹ️ Você ainda não tem uma assinatura.".to_string(),
        SubscriptionStatus::Active { expires_at } => format!(
            "✅ Assinatura ativa até <b>{}</b> ({} dias restantes).",
            expires_at.format(DATE_FORMAT),
            remaining_days(*expires_at, now)
        ),
        SubscriptionStatus::Expired { expired_at } => {
            format!("⌛ Sua assinatura expirou em <b>{}</b>.", expired_at.format(DATE_FORMAT))
        }
    }
}

pub fn god_text(toggle: &GodToggle) -> String {
    match toggle {
        GodToggle::Enabled => "🔥 <b>MODO GOD</b> ativado.".to_string(),
        GodToggle::Disabled => "MODO GOD desativado.".to_string(),
        GodToggle::RequiresSubscription(SubscriptionStatus::Expired { .. }) => {
            "⌛ Sua assinatura expirou. Renove para usar o MODO GOD.".to_string()
        }
        GodToggle::RequiresSubscription(_) => "🔒 O MODO GOD é exclusivo para assinantes.".to_string(),
        GodToggle::Unavailable => unavailable_text(),
    }
}

pub fn history_text(history: &[Spin]) -> String {
    let start = history.len().saturating_sub(HISTORY_SHOWN);
    let shown: String = history[start..].iter().map(|spin| spin.emoji()).collect();
    if shown.is_empty() {
        "—".to_string()
    } else {
        shown
    }
}

fn reason_text(trigger: &Trigger, mode: RiskMode, pattern_pick: &str) -> String {
    let stance = match mode {
        RiskMode::Conservative => "reversão",
        RiskMode::Aggressive => "continuidade",
    };
    match trigger {
        Trigger::Run(side) => format!(
            "Run {} detectada (≥3/4). {} → {} em {}.",
            side.label(),
            mode,
            stance,
            pattern_pick
        ),
        Trigger::Deviation { chi2, p, .. } => format!(
            "Desvio R/B χ²={:.2} p≈{:.3}. {} → {} em {}.",
            chi2, p, mode, stance, pattern_pick
        ),
    }
}

pub fn waiting_text() -> String {
    "⏳ <b>Aguardando mais dados…</b>\n\
     <i>Envie os próximos resultados para liberar uma nova recomendação.</i>"
        .to_string()
}

/// Reply to a recorded spin. `mode` is the user's own profile; `god` is
/// whether MODO GOD was in effect.
pub fn recommendation_text(
    spin: Spin,
    history: &[Spin],
    recommendation: &Recommendation,
    mode: RiskMode,
    god: bool,
) -> String {
    let mut text = format!(
        "✅ <b>Registrado:</b> {}\n\n📋 <b>Histórico (últimos {}):</b> {}\n\n",
        spin.emoji(),
        HISTORY_SHOWN,
        history_text(history)
    );

    match recommendation {
        Recommendation::Pick {
            side,
            trigger,
            mode: analysed,
            inverted,
        } => {
            let pattern_pick = if *inverted { side.opposite() } else { *side };
            let mut why = reason_text(trigger, *analysed, pattern_pick.label());
            if *inverted {
                why.push_str(&format!(" → 🧠 MODO GOD: invertido em {}.", side.label()));
            }
            text.push_str(&format!(
                "🎯 <b>Recomendação:</b> {}\n📖 <b>Motivo:</b> {}\n⚙️ <b>Perfil:</b> {}  |  🧠 <b>MODO GOD:</b> {}",
                side.label(),
                why,
                mode,
                if god { "ON" } else { "OFF" }
            ));
        }
        Recommendation::ZeroReset => {
            text.push_str("🟢 Zero recente: reiniciando leitura curta.");
            if god {
                text.push_str(" (MODO GOD ativo: aguardando para inverter)");
            }
            text.push_str("\n\n");
            text.push_str(&waiting_text());
        }
        Recommendation::Waiting => {
            if god {
                text.push_str("🧠 MODO GOD ativo: aguardando para inverter.\n\n");
            }
            text.push_str(&waiting_text());
        }
    }
    text
}

pub fn mode_text(mode: RiskMode) -> String {
    format!("⚙️ <b>Perfil:</b> {}", mode)
}

pub fn reset_text() -> String {
    "♻️ Histórico limpo.".to_string()
}

pub fn unavailable_text() -> String {
    "⚠️ Não foi possível verificar sua assinatura agora. Tente novamente em instantes.".to_string()
}

async fn reply_html(bot: &Bot, msg: &Message, text: String) -> Result<(), teloxide::RequestError> {
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

pub async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), teloxide::RequestError> {
    reply_html(bot, msg, welcome_text()).await
}

pub async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), teloxide::RequestError> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
    Ok(())
}

pub async fn handle_status_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), teloxide::RequestError> {
    let user_id = sender_id(msg);
    let text = match deps.ledger.status(user_id).await {
        Ok(status) => status_text(&status, deps.ledger.now()),
        Err(e) => {
            log::error!("❌ Failed to read subscription for user {}: {}", user_id, e);
            unavailable_text()
        }
    };
    reply_html(bot, msg, text).await
}

pub async fn handle_god_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), teloxide::RequestError> {
    let user_id = sender_id(msg);
    let toggle = toggle_god_mode(&deps.ledger, &deps.god_mode, user_id).await;
    log::info!("MODO GOD for user {}: {:?}", user_id, toggle);
    reply_html(bot, msg, god_text(&toggle)).await
}

/// Records the spin and replies with the next recommendation. MODO GOD
/// applies only while the subscription is active.
pub async fn handle_spin_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    spin: Spin,
) -> Result<(), teloxide::RequestError> {
    let user_id = sender_id(msg);
    let session = deps.sessions.record(user_id, spin);
    let god = effective_god_mode(&deps.ledger, &deps.god_mode, user_id).await;
    let recommendation = recommend_with_god(&session.history, session.mode, god);
    log::debug!("User {} spin {:?} -> {:?} (god: {})", user_id, spin, recommendation, god);

    let text = recommendation_text(spin, &session.history, &recommendation, session.mode, god);
    reply_html(bot, msg, text).await
}

pub async fn handle_mode_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), teloxide::RequestError> {
    let mode = deps.sessions.toggle_mode(sender_id(msg));
    reply_html(bot, msg, mode_text(mode)).await
}

pub async fn handle_reset_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), teloxide::RequestError> {
    deps.sessions.reset(sender_id(msg));
    reply_html(bot, msg, reset_text()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_status_text_variants() {
        let now = at(1_700_000_000);

        assert!(status_text(&SubscriptionStatus::Never, now).contains("não tem"));

        let active = SubscriptionStatus::Active {
            expires_at: now + Duration::days(10) + Duration::hours(3),
        };
        assert!(status_text(&active, now).contains("10 dias restantes"));

        let expired = SubscriptionStatus::Expired {
            expired_at: now - Duration::days(1),
        };
        assert!(status_text(&expired, now).contains("expirou em"));
    }

    #[test]
    fn test_god_text_distinguishes_lapsed_subscribers() {
        let lapsed = GodToggle::RequiresSubscription(SubscriptionStatus::Expired {
            expired_at: at(1_700_000_000),
        });
        assert!(god_text(&lapsed).contains("Renove"));
        assert!(god_text(&GodToggle::RequiresSubscription(SubscriptionStatus::Never)).contains("exclusivo"));
        assert_eq!(god_text(&GodToggle::Unavailable), unavailable_text());
    }

    #[test]
    fn test_history_text_shows_last_twelve() {
        assert_eq!(history_text(&[]), "—");

        let mut history = vec![Spin::Zero];
        history.extend(std::iter::repeat(Spin::Red).take(12));
        let text = history_text(&history);
        assert_eq!(text, "🔴".repeat(12));
    }

    #[test]
    fn test_recommendation_text_for_inverted_pick() {
        use crate::telegram::recommend::Side;

        let history = [Spin::Black, Spin::Red, Spin::Red, Spin::Red];
        let recommendation = recommend_with_god(&history, RiskMode::Conservative, true);
        let text = recommendation_text(Spin::Red, &history, &recommendation, RiskMode::Conservative, true);

        assert!(text.contains(&format!("<b>Recomendação:</b> {}", Side::Black.label())));
        assert!(text.contains("Agressivo → continuidade em 🔴 Vermelho"));
        assert!(text.contains("invertido em ⚫ Preto"));
        assert!(text.contains("<b>Perfil:</b> Conservador"));
        assert!(text.contains("MODO GOD:</b> ON"));
    }

    #[test]
    fn test_recommendation_text_waits_without_a_pick() {
        let history = [Spin::Red, Spin::Zero];
        let text = recommendation_text(
            Spin::Zero,
            &history,
            &Recommendation::ZeroReset,
            RiskMode::Conservative,
            false,
        );
        assert!(text.contains("Zero recente"));
        assert!(text.contains("Aguardando mais dados"));
        assert!(!text.contains("Recomendação:"));

        let text = recommendation_text(Spin::Red, &[Spin::Red], &Recommendation::Waiting, RiskMode::Aggressive, true);
        assert!(text.contains("aguardando para inverter"));
    }
}
