//! Dispatcher schema

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{
    handle_god_command, handle_help_command, handle_mode_command, handle_reset_command, handle_spin_command,
    handle_start_command, handle_status_command,
};
use super::types::{HandlerDeps, HandlerError};
use crate::core::metrics;
use crate::telegram::bot::Command;
use crate::telegram::recommend::Spin;

/// Creates the dispatcher schema for the bot.
///
/// The same tree is used for polling and webhook delivery.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry().branch(command_handler(deps))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
                metrics::record_command(cmd.name());

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg).await?,
                    Command::Help => handle_help_command(&bot, &msg).await?,
                    Command::Status => handle_status_command(&bot, &msg, &deps).await?,
                    Command::God => handle_god_command(&bot, &msg, &deps).await?,
                    Command::Vermelho => handle_spin_command(&bot, &msg, &deps, Spin::Red).await?,
                    Command::Preto => handle_spin_command(&bot, &msg, &deps, Spin::Black).await?,
                    Command::Zero => handle_spin_command(&bot, &msg, &deps, Spin::Zero).await?,
                    Command::Modo => handle_mode_command(&bot, &msg, &deps).await?,
                    Command::Reset => handle_reset_command(&bot, &msg, &deps).await?,
                }
                Ok(())
            }
        },
    ))
}
