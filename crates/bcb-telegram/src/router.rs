//! Polling loop: wires the core dispatcher behind teloxide's update stream.

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use bcb_core::{
    club::{self, ClubBot},
    config::Config,
    dialog::DialogRegistry,
    dispatch::{CommandRegistry, Dispatcher as EventDispatcher},
    messaging::types::InboundEvent,
    metadata::BookSearch,
    permissions::PermissionEvaluator,
    store::Store,
};

use crate::{update, TelegramMessenger};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<EventDispatcher<ClubBot>>,
    pub bot_username: String,
}

/// Builds the bot and polls until shutdown. Store and metadata client are
/// injected so the binary decides the backends.
pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<dyn Store>,
    search: Option<Arc<dyn BookSearch>>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());
    let me = bot.get_me().await?;
    let bot_username = me.username().to_string();
    tracing::info!(bot = %bot_username, "starting polling");

    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let dialogs = Arc::new(DialogRegistry::new());

    let club = Arc::new(ClubBot::new(
        store.clone(),
        messenger.clone(),
        dialogs.clone(),
        search,
        cfg.button_label_max_length,
        cfg.deadline_utc_offset_hours,
    )?);

    let mut commands = CommandRegistry::new();
    club::register_commands(&mut commands)?;

    let gate = PermissionEvaluator::new(messenger.clone());
    let dispatcher = Arc::new(EventDispatcher::new(
        club,
        commands,
        dialogs,
        gate,
        store,
        messenger,
    ));

    let state = Arc::new(AppState {
        dispatcher,
        bot_username,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_inline_query().endpoint(handle_inline))
        .branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

// Dispatch errors are logged per update; one bad event never stops the loop.
async fn dispatch(state: &AppState, event: InboundEvent) {
    if let Err(err) = state.dispatcher.dispatch(event).await {
        tracing::error!(%err, "event handling failed");
    }
}

async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(event) = update::map_message(&msg, &state.bot_username) {
        dispatch(&state, event).await;
    }
    Ok(())
}

async fn handle_callback(query: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(event) = update::map_callback(&query) {
        dispatch(&state, event).await;
    }
    Ok(())
}

async fn handle_inline(query: InlineQuery, state: Arc<AppState>) -> ResponseResult<()> {
    dispatch(&state, update::map_inline(&query)).await;
    Ok(())
}
