//! `conduit_router::TelegramSender` adapter over a live `teloxide::Bot`.

use async_trait::async_trait;
use teloxide::prelude::*;

use conduit_router::{DeliveryError, TelegramSender};

pub struct BotTelegramSender {
    bot: Bot,
}

impl BotTelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl TelegramSender for BotTelegramSender {
    async fn send_chunk(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(())
    }
}
