//! Telegram handlers for commands, photos, videos and links.
//!
//! Each media handler posts a status message, runs the pipeline and either
//! swaps the status for the finished animation or edits it into the generic
//! failure notice. Pipeline detail stays in the log.

use crate::bot::TelegramSink;
use crate::config::Settings;
use crate::pipeline::{MediaRequest, Pipeline, RequestKind};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, LinkPreviewOptions, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, warn};

/// Bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "start the bot")]
    Start,
    /// Same welcome, for users who ask for help
    #[command(description = "show usage help")]
    Help,
}

/// Welcome text sent for /start and /help.
pub const WELCOME_MESSAGE: &str = "\
<b>👋 Welcome to UniGif!</b>\n\
\n\
I can convert your media into lightweight Telegram GIFs.\n\
\n\
<b>✨ Features:</b>\n\
▪️ <b>Photos</b> → GIFs (Animated)\n\
▪️ <b>Videos</b> → GIFs (Max 12s)\n\
▪️ <b>Links</b> → Discord, Tenor, Giphy supported\n\
\n\
<i>Just send me a file or a link to start!</i>\n\
\n\
🔗 <a href=\"https://github.com/pynvox/\">Open Source Project</a>";

/// Handle /start and /help.
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, WELCOME_MESSAGE)
        .parse_mode(ParseMode::Html)
        .link_preview_options(disabled_link_preview())
        .await?;
    Ok(())
}

/// Handle an inbound photo.
///
/// # Errors
///
/// Returns an error if the status message cannot be sent.
pub async fn handle_photo(
    bot: Bot,
    msg: Message,
    pipeline: Arc<Pipeline>,
    settings: Arc<Settings>,
) -> Result<()> {
    // Highest-resolution size is last
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };
    let status = bot.send_message(msg.chat.id, "🎨 Processing...").await?;
    let file_id = photo.file.id.clone();
    dispatch_file(&bot, &msg, status.id, RequestKind::Photo, file_id, &pipeline, &settings).await
}

/// Handle an inbound video.
///
/// # Errors
///
/// Returns an error if the status message cannot be sent.
pub async fn handle_video(
    bot: Bot,
    msg: Message,
    pipeline: Arc<Pipeline>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(video) = msg.video() else {
        return Ok(());
    };
    let status = bot.send_message(msg.chat.id, "⚡️ Converting...").await?;
    let file_id = video.file.id.clone();
    dispatch_file(&bot, &msg, status.id, RequestKind::Video, file_id, &pipeline, &settings).await
}

/// Handle a message whose text is a URL.
///
/// # Errors
///
/// Returns an error if the status message cannot be sent.
pub async fn handle_link(
    bot: Bot,
    msg: Message,
    pipeline: Arc<Pipeline>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(url) = msg.text().map(str::trim) else {
        return Ok(());
    };
    debug!(url, "received link");
    let status = bot.send_message(msg.chat.id, "🔗 Analyzing link...").await?;
    let request = MediaRequest::link(url);
    run_request(&bot, &msg, status.id, request, &pipeline, &settings).await;
    Ok(())
}

/// Turn a Telegram file reference into a pipeline request and run it.
async fn dispatch_file(
    bot: &Bot,
    msg: &Message,
    status_id: MessageId,
    kind: RequestKind,
    file_id: FileId,
    pipeline: &Pipeline,
    settings: &Settings,
) -> Result<()> {
    let request = match file_request(bot, settings, kind, file_id).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to resolve file reference");
            edit_to_notice(bot, msg.chat.id, status_id, kind).await;
            return Ok(());
        }
    };
    run_request(bot, msg, status_id, request, pipeline, settings).await;
    Ok(())
}

async fn file_request(
    bot: &Bot,
    settings: &Settings,
    kind: RequestKind,
    file_id: FileId,
) -> Result<MediaRequest> {
    let file = bot.get_file(file_id).await?;
    let source = telegram_file_url(&settings.telegram_token, &file.path);
    Ok(MediaRequest { kind, source })
}

/// Download URL for a file path returned by `getFile`.
fn telegram_file_url(token: &str, file_path: &str) -> String {
    format!("https://api.telegram.org/file/bot{token}/{file_path}")
}

async fn run_request(
    bot: &Bot,
    msg: &Message,
    status_id: MessageId,
    request: MediaRequest,
    pipeline: &Pipeline,
    settings: &Settings,
) {
    let sink = TelegramSink::new(
        bot.clone(),
        msg.chat.id,
        format!("Via {}", settings.bot_username),
    );
    match pipeline.process(&request, &sink).await {
        Ok(()) => {
            if let Err(e) = bot.delete_message(msg.chat.id, status_id).await {
                debug!(error = %e, "failed to delete status message");
            }
            // The pasted link is noise once the animation is up
            if request.kind == RequestKind::Link {
                let _ = bot.delete_message(msg.chat.id, msg.id).await;
            }
        }
        Err(_) => edit_to_notice(bot, msg.chat.id, status_id, request.kind).await,
    }
}

async fn edit_to_notice(bot: &Bot, chat_id: ChatId, status_id: MessageId, kind: RequestKind) {
    if let Err(e) = bot
        .edit_message_text(chat_id, status_id, kind.failure_notice())
        .await
    {
        debug!(error = %e, "failed to edit status message");
    }
}

fn disabled_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}
