//! In-memory session store: chat -> chronological list of game sessions.
//!
//! All access goes through one `parking_lot::RwLock`. Queries take it shared,
//! mutations take it exclusive, so writes to every chat are serialized.
//! Closures passed to `mutate_active` run under the write lock and must not
//! do I/O.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{HangmanError, Result};
use crate::game::{GameSession, GameStatus};
use crate::models::ChatId;

/// Point-in-time copy of every chat's sessions, ordered by chat for stable output.
pub type Snapshot = BTreeMap<ChatId, Vec<GameSession>>;

/// Won/lost tally for one chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStats {
    pub won: usize,
    pub lost: usize,
    pub stopped: usize,
    pub played: usize,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    chats: RwLock<FxHashMap<ChatId, Vec<GameSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.restore(snapshot);
        store
    }

    /// Copy of the chat's active session, if its latest session is still active.
    pub fn get_active(&self, chat_id: ChatId) -> Option<GameSession> {
        let chats = self.chats.read();
        chats
            .get(&chat_id)
            .and_then(|sessions| sessions.last())
            .filter(|session| session.is_active())
            .cloned()
    }

    /// Append a new session, unless the chat already has an active one.
    pub fn start_new(&self, chat_id: ChatId, session: GameSession) -> Result<()> {
        let mut chats = self.chats.write();
        let sessions = chats.entry(chat_id).or_default();

        if sessions.last().map_or(false, |s| s.is_active()) {
            return Err(HangmanError::AlreadyActive { chat_id });
        }

        sessions.push(session);
        Ok(())
    }

    /// Apply `f` to the chat's active session under the write lock and store
    /// the session it returns in the same slot.
    pub fn mutate_active<F, R>(&self, chat_id: ChatId, f: F) -> Result<R>
    where
        F: FnOnce(GameSession) -> (GameSession, R),
    {
        let mut chats = self.chats.write();
        let Some(slot) = chats
            .get_mut(&chat_id)
            .and_then(|sessions| sessions.last_mut())
            .filter(|session| session.is_active())
        else {
            return Err(HangmanError::NoActiveGame { chat_id });
        };

        // Work on a copy so a panicking closure leaves the slot untouched.
        let (updated, result) = f(slot.clone());
        *slot = updated;
        Ok(result)
    }

    /// Tally finished games for a chat. `None` when the chat never played.
    pub fn chat_stats(&self, chat_id: ChatId) -> Option<ChatStats> {
        let chats = self.chats.read();
        let sessions = chats.get(&chat_id).filter(|s| !s.is_empty())?;

        let mut stats = ChatStats {
            played: sessions.len(),
            ..ChatStats::default()
        };
        for session in sessions {
            match session.status() {
                GameStatus::Won => stats.won += 1,
                GameStatus::Lost => stats.lost += 1,
                GameStatus::Stopped => stats.stopped += 1,
                GameStatus::Active => {}
            }
        }
        Some(stats)
    }

    pub fn chat_count(&self) -> usize {
        self.chats.read().len()
    }

    pub fn session_count(&self) -> usize {
        self.chats.read().values().map(Vec::len).sum()
    }

    /// Immutable copy of the whole mapping, taken under the read lock.
    pub fn snapshot(&self) -> Snapshot {
        let chats = self.chats.read();
        chats
            .iter()
            .map(|(chat_id, sessions)| (*chat_id, sessions.clone()))
            .collect()
    }

    /// Replace everything with `snapshot`. Meant for startup, before any
    /// handler runs.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut chats = self.chats.write();
        *chats = snapshot.into_iter().collect();
    }
}
