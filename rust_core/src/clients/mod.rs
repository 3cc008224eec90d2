pub mod memory;
pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BotIdentity, InboundMessage, OutboundMessage};

// Re-export commonly used types
pub use memory::MemoryTransport;
pub use telegram::TelegramClient;

/// A chat platform the bot talks through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Who the bot is on this platform.
    async fn identity(&self) -> Result<BotIdentity>;

    /// Wait for the next batch of inbound messages. May return an empty batch.
    async fn poll_updates(&self) -> Result<Vec<InboundMessage>>;

    /// Deliver one message.
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}
