use super::commands::Command;
use super::events;
use crate::engine::Engine;
use crate::event::Event;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Me, PreCheckoutQuery};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Registers the command menu and dispatches updates until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the bot identity cannot be fetched.
pub async fn run_bot(bot: Bot, engine: Arc<Engine>) -> anyhow::Result<()> {
    let me = bot.get_me().await?;
    info!(username = ?me.username, "Bot identity confirmed");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot command menu");
    }

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_pre_checkout_query().endpoint(handle_pre_checkout))
}

/// Hands the event to the engine on its own task.
fn spawn_event(engine: Arc<Engine>, event: Event) {
    tokio::spawn(async move {
        let event_id = event.event_id.clone();
        let handled = engine.handle(event).await;
        debug!(event_id = %event_id, ?handled, "Event handled");
    });
}

async fn handle_message(
    msg: Message,
    me: Me,
    engine: Arc<Engine>,
) -> Result<(), teloxide::RequestError> {
    spawn_event(engine, events::from_message(&msg, me.username()));
    respond(())
}

async fn handle_callback(
    q: CallbackQuery,
    engine: Arc<Engine>,
) -> Result<(), teloxide::RequestError> {
    spawn_event(engine, events::from_callback(&q));
    respond(())
}

async fn handle_pre_checkout(
    q: PreCheckoutQuery,
    engine: Arc<Engine>,
) -> Result<(), teloxide::RequestError> {
    spawn_event(engine, events::from_pre_checkout(&q));
    respond(())
}
