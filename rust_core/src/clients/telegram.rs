//! Telegram Bot API client.
//!
//! Long-polls `getUpdates` and tracks the update offset itself, so callers
//! only ever see each message once. Non-text updates are dropped here.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::Transport;
use crate::error::{HangmanError, Result};
use crate::models::{
    BotIdentity, ChatId, InboundMessage, MessageId, OutboundMessage, ReplyRef, Sender, UserId,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: UserId,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: ChatId,
}

#[derive(Debug, Deserialize)]
struct MessageEntity {
    #[serde(rename = "type")]
    kind: String,
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct RepliedMessage {
    message_id: MessageId,
    #[serde(default)]
    from: Option<User>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: MessageId,
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    entities: Vec<MessageEntity>,
    #[serde(default)]
    reply_to_message: Option<Box<RepliedMessage>>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct ForceReply {
    force_reply: bool,
    selective: bool,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ForceReply>,
}

impl Message {
    fn into_inbound(self) -> Option<InboundMessage> {
        let text = self.text?;
        let sender = self
            .from
            .map(|u| Sender {
                id: u.id,
                first_name: u.first_name,
                last_name: u.last_name,
            })
            .unwrap_or_default();
        let is_command = self
            .entities
            .iter()
            .any(|e| e.kind == "bot_command" && e.offset == 0);

        Some(InboundMessage {
            message_id: self.message_id,
            chat_id: self.chat.id,
            sender,
            text,
            is_command: Some(is_command),
            reply_to: self.reply_to_message.map(|r| ReplyRef {
                message_id: r.message_id,
                from_id: r.from.map(|u| u.id),
            }),
        })
    }
}

pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: String,
    poll_timeout: Duration,
    offset: AtomicI64,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("poll_timeout", &self.poll_timeout)
            .field("offset", &self.offset.load(Ordering::Relaxed))
            .finish()
    }
}

impl TelegramClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            // Leave headroom over the long-poll window before reqwest gives up.
            http: Client::builder()
                .timeout(poll_timeout + Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into(),
            token: token.into(),
            poll_timeout,
            offset: AtomicI64::new(0),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                HangmanError::transport(format!("Telegram {} request failed", method), e)
            })?;

        let status = resp.status();
        let parsed: ApiResponse<T> = resp.json().await.map_err(|e| {
            HangmanError::transport(
                format!("Telegram {} returned bad JSON ({})", method, status),
                e,
            )
        })?;

        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(HangmanError::Transport {
                reason: format!(
                    "Telegram {} failed ({}): {}",
                    method,
                    status,
                    parsed.description.unwrap_or_default()
                ),
                source: None,
            }),
        }
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn identity(&self) -> Result<BotIdentity> {
        let me: User = self.call("getMe", &serde_json::json!({})).await?;
        Ok(BotIdentity::new(me.id, me.username.unwrap_or_default()))
    }

    async fn poll_updates(&self) -> Result<Vec<InboundMessage>> {
        let request = GetUpdatesRequest {
            offset: self.offset.load(Ordering::SeqCst),
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::SeqCst);
        }
        debug!("Received {} updates", updates.len());

        Ok(updates
            .into_iter()
            .filter_map(|u| u.message)
            .filter_map(Message::into_inbound)
            .collect())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: message.chat_id,
            text: &message.text,
            reply_to_message_id: message.reply_to_message_id,
            reply_markup: message.force_reply.then_some(ForceReply {
                force_reply: true,
                selective: true,
            }),
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }
}
