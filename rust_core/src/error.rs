//! Error taxonomy for the hangman core.
//!
//! Game-level errors (`AlreadyActive`, `NoActiveGame`, `InvalidInput`) are
//! recoverable and handled at the handler boundary. Collaborator errors
//! (`DictionaryUnavailable`, `PersistenceFailure`, `Transport`) are logged and
//! abort only the operation that hit them.

use crate::models::ChatId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur anywhere in the bot core.
#[derive(Debug, thiserror::Error)]
pub enum HangmanError {
    #[error("a game is already active in chat {chat_id}")]
    AlreadyActive { chat_id: ChatId },

    #[error("no active game in chat {chat_id}")]
    NoActiveGame { chat_id: ChatId },

    #[error("invalid guess input: {input:?}")]
    InvalidInput { input: String },

    #[error("dictionary unavailable: {reason}")]
    DictionaryUnavailable {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("persistence failure: {reason}")]
    PersistenceFailure {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("outbound queue closed")]
    QueueClosed,
}

impl HangmanError {
    pub fn dictionary(reason: impl Into<String>) -> Self {
        Self::DictionaryUnavailable {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn persistence<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::PersistenceFailure {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn transport<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for errors a player caused; these are answered in chat, not logged as failures.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive { .. } | Self::NoActiveGame { .. } | Self::InvalidInput { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HangmanError>;
