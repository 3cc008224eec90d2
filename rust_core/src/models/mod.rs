// Shared models for the hangman bot
use serde::{Deserialize, Serialize};

pub type ChatId = i64;
pub type UserId = i64;
pub type MessageId = i64;

// ============================================================================
// Bot identity
// ============================================================================

/// Who the bot is on the chat platform. Used to address commands and replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: UserId,
    pub username: String,
}

impl BotIdentity {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }

    /// Case-insensitive match against a command's `@target` suffix.
    pub fn is_addressed_by(&self, target: &str) -> bool {
        self.username.eq_ignore_ascii_case(target)
    }
}

// ============================================================================
// Inbound
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Sender {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// The message a chat message was replying to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub message_id: MessageId,
    pub from_id: Option<UserId>,
}

/// One inbound chat message, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub sender: Sender,
    pub text: String,
    /// Set by transports that know; otherwise inferred from a leading `/`.
    #[serde(default)]
    pub is_command: Option<bool>,
    #[serde(default)]
    pub reply_to: Option<ReplyRef>,
}

impl InboundMessage {
    pub fn new(
        message_id: MessageId,
        chat_id: ChatId,
        sender: Sender,
        text: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            chat_id,
            sender,
            text: text.into(),
            is_command: None,
            reply_to: None,
        }
    }

    pub fn replying_to(mut self, message_id: MessageId, from_id: Option<UserId>) -> Self {
        self.reply_to = Some(ReplyRef {
            message_id,
            from_id,
        });
        self
    }

    pub fn is_command(&self) -> bool {
        self.is_command
            .unwrap_or_else(|| self.text.starts_with(COMMAND_PREFIX))
    }
}

pub const COMMAND_PREFIX: char = '/';

// ============================================================================
// Outbound
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    #[serde(default)]
    pub reply_to_message_id: Option<MessageId>,
    /// Ask the client to open a focused reply box for the player.
    #[serde(default)]
    pub force_reply: bool,
}

impl OutboundMessage {
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to_message_id: None,
            force_reply: false,
        }
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }

    pub fn with_force_reply(mut self) -> Self {
        self.force_reply = true;
        self
    }
}
