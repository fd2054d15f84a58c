//! Application loop: polls Telegram and hands media to the relay.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use filerelay_destinations::{DestinationFamily, DestinationResolver, UploadClient};
use filerelay_relay::{RelayOrchestrator, TransferResult};
use filerelay_telegram::{BotClient, Message, inbound};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Pause after a failed `getUpdates`.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Runs the bot until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let bot = BotClient::new(&config.bot_token)?.with_base_url(&config.telegram_api_url);
    let me = bot.get_me().await.context("validating bot token")?;
    info!(
        bot = me.username.as_deref().unwrap_or("?"),
        id = me.id,
        "connected to Telegram"
    );
    let bot = Arc::new(bot);

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()?;
    let endpoints = Arc::new(config.endpoints.clone());
    let resolver = DestinationResolver::new(http.clone(), endpoints.clone())
        .with_timeout(Duration::from_secs(config.discovery_timeout_secs));
    let uploader = UploadClient::new(http, endpoints);
    let relay = Arc::new(RelayOrchestrator::new(
        bot.clone(),
        resolver,
        uploader,
        config.relay_config(),
    ));

    let shutdown = relay.cancel_token();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("SIGINT received, shutting down");
            }
            shutdown.cancel();
        }
    });

    info!("bot ready");
    let mut tasks = JoinSet::new();
    let mut offset = None;

    loop {
        let polled = tokio::select! {
            _ = shutdown.cancelled() => break,
            polled = bot.get_updates(offset, config.poll_timeout_secs) => polled,
        };

        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "relay task panicked");
            }
        }

        let updates = match polled {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "polling failed, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(POLL_BACKOFF) => continue,
                }
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            if let Some(message) = update.message {
                dispatch(&mut tasks, &bot, &relay, config.destination, &message);
            }
        }
    }

    // In-flight runs observe the cancelled root token and release staging.
    shutdown.cancel();
    if !tasks.is_empty() {
        info!(runs = tasks.len(), "waiting for in-flight transfers");
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "relay task panicked");
        }
    }
    Ok(())
}

fn dispatch(
    tasks: &mut JoinSet<()>,
    bot: &Arc<BotClient>,
    relay: &Arc<RelayOrchestrator>,
    destination: DestinationFamily,
    message: &Message,
) {
    let (chat_id, message_id) = (message.chat.id, message.message_id);
    match message.command() {
        Some("start") => {
            let bot = bot.clone();
            tasks.spawn(async move {
                if let Err(e) = bot
                    .send_message(chat_id, &greeting(destination), Some(message_id))
                    .await
                {
                    warn!(chat = chat_id, error = %e, "greeting failed");
                }
            });
        }
        Some(other) => debug!(command = other, "ignoring command"),
        None => {
            let incoming = inbound(message);
            if incoming.file.is_none() {
                debug!(chat = chat_id, "message without media");
                return;
            }
            let relay = relay.clone();
            tasks.spawn(async move {
                match relay.relay(&incoming).await {
                    Some(TransferResult::Success { display_name, .. }) => {
                        debug!(chat = chat_id, file = %display_name, "relay finished");
                    }
                    Some(TransferResult::Failure { error_kind, .. }) => {
                        debug!(chat = chat_id, kind = %error_kind, "relay finished with failure");
                    }
                    None => {}
                }
            });
        }
    }
}

fn greeting(destination: DestinationFamily) -> String {
    format!(
        "👋 File relay bot ready!\nSend me a document, photo, video, audio or voice message \
         and I'll upload it to {destination} and reply with a download link."
    )
}
