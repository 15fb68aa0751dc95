//! Telegram delivery sink.

use crate::pipeline::AnimationSink;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};

/// Sends finished animations into one chat.
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
    caption: String,
}

impl TelegramSink {
    /// Sink bound to the chat that originated the request.
    #[must_use]
    pub fn new(bot: Bot, chat_id: ChatId, caption: String) -> Self {
        Self {
            bot,
            chat_id,
            caption,
        }
    }
}

#[async_trait]
impl AnimationSink for TelegramSink {
    async fn deliver(&self, animation: &Path) -> anyhow::Result<()> {
        // The send future resolves after the upload, so the caller may
        // release the file as soon as this returns
        self.bot
            .send_animation(self.chat_id, InputFile::file(animation.to_path_buf()))
            .caption(self.caption.clone())
            .await?;
        Ok(())
    }
}
