//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::core::error::AppResult;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Comandos disponíveis:")]
pub enum Command {
    #[command(description = "iniciar")]
    Start,
    #[command(description = "ajuda")]
    Help,
    #[command(description = "situação da assinatura")]
    Status,
    #[command(description = "ligar/desligar o MODO GOD (assinantes)")]
    God,
    #[command(description = "registrar giro vermelho")]
    Vermelho,
    #[command(description = "registrar giro preto")]
    Preto,
    #[command(description = "registrar zero")]
    Zero,
    #[command(description = "alternar perfil Conservador/Agressivo")]
    Modo,
    #[command(description = "limpar o histórico")]
    Reset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Status => "status",
            Command::God => "god",
            Command::Vermelho => "vermelho",
            Command::Preto => "preto",
            Command::Zero => "zero",
            Command::Modo => "modo",
            Command::Reset => "reset",
        }
    }
}

/// Creates a Bot instance with a bounded request timeout
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(AppError)` - Failed to build the HTTP client or parse BOT_API_URL
pub fn create_bot(token: &str) -> AppResult<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(token, client);

    // Local Bot API server, if configured
    let bot = match std::env::var("BOT_API_URL").ok().filter(|v| !v.trim().is_empty()) {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            bot.set_api_url(url::Url::parse(&bot_api_url)?)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> AppResult<()> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_parse() {
        assert_eq!(Command::parse("/status", "icolor_bot").unwrap(), Command::Status);
        assert_eq!(Command::parse("/god", "icolor_bot").unwrap(), Command::God);
        assert_eq!(Command::parse("/vermelho", "icolor_bot").unwrap(), Command::Vermelho);
        assert_eq!(Command::parse("/modo", "icolor_bot").unwrap(), Command::Modo);
        assert!(Command::parse("/unknown", "icolor_bot").is_err());
    }

    #[test]
    fn test_command_descriptions() {
        let text = Command::descriptions().to_string();
        assert!(text.contains("Comandos disponíveis"));
        assert!(text.contains("/status"));
        assert!(text.contains("MODO GOD"));
    }
}
