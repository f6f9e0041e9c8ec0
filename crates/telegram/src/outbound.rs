use async_trait::async_trait;

use courier_common::ChatId;

use crate::{TelegramClient, error::Result};

/// Send replies back to a chat.
///
/// The dispatcher only talks to the platform through this trait so tests can
/// record replies instead of hitting the network.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Acknowledge an inline-button press. No-op by default.
    async fn acknowledge_callback(&self, _query_id: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ChannelOutbound for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.send_message(chat_id, text).await
    }

    async fn acknowledge_callback(&self, query_id: &str) -> Result<()> {
        self.answer_callback_query(query_id).await
    }
}
