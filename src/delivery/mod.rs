//! Delivery of giveaway posts to chat channels.
//!
//! The pipeline only needs three things from a chat platform: the bot's own
//! recent messages in a channel, sending a message, and deleting one.

pub mod discord;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub use discord::DiscordClient;

/// A message previously sent by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: u64,
    pub content: String,
}

/// Chat platform operations used by scanning, cleanup and clearing.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Bot-authored messages among the latest `limit` in a channel, newest first.
    async fn recent_own_messages(&self, channel_id: u64, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Send `content` and return the new message id.
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<u64>;

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<()>;
}

/// Stand-in used when no bot credential is configured.
///
/// Every call fails, so only read-only work such as previews can run.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

#[async_trait]
impl ChatClient for Offline {
    async fn recent_own_messages(&self, _channel_id: u64, _limit: usize) -> Result<Vec<ChatMessage>> {
        Err(AppError::chat("read channel history", "no bot credential configured"))
    }

    async fn send_message(&self, _channel_id: u64, _content: &str) -> Result<u64> {
        Err(AppError::chat("send message", "no bot credential configured"))
    }

    async fn delete_message(&self, _channel_id: u64, _message_id: u64) -> Result<()> {
        Err(AppError::chat("delete message", "no bot credential configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_client_refuses_everything() {
        let chat = Offline;
        assert!(chat.recent_own_messages(1, 10).await.is_err());
        assert!(chat.send_message(1, "hi").await.is_err());
        assert!(chat.delete_message(1, 2).await.is_err());
    }
}
