//! Hangman game state machine.
//!
//! One `GameSession` is one play-through for one chat. All transitions are
//! value-in, value-out: the caller hands the session over and gets the updated
//! session back together with what happened.
//!
//! # State Diagram
//!
//! ```text
//!                 incorrect, lives remain
//!                 ┌──────┐
//!                 ▼      │
//!            ┌──────────┐  all letters guessed   ┌─────┐
//!   start ──▶│  Active  │───────────────────────▶│ Won │
//!            └────┬─────┘                        └─────┘
//!                 │ incorrect, lives exhausted
//!                 │ or stop with lives <= 3      ┌──────┐
//!                 ├─────────────────────────────▶│ Lost │
//!                 │                              └──────┘
//!                 │ stop with lives > 3          ┌─────────┐
//!                 └─────────────────────────────▶│ Stopped │
//!                                                └─────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HangmanError, Result};
use crate::models::UserId;

/// Lives a new game starts with.
pub const STARTING_LIVES: u32 = 10;

/// At or below this many lives a stop counts as a loss.
pub const MERCY_STOP_THRESHOLD: u32 = 3;

/// Shown in place of every letter nobody has guessed yet.
pub const MASK: char = '➖';

/// Secret words must be longer than this.
pub const MIN_WORD_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Stopped,
    Won,
    Lost,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stopped => "stopped",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted guess. Never mutated after it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guess {
    pub author: UserId,
    pub letter: char,
    pub correct: bool,
}

/// Result of feeding one letter to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct,
    Incorrect,
    Won,
    Lost,
    /// Letter was guessed before; session unchanged.
    Repeated,
    /// Session is terminal; session unchanged.
    NotActive,
}

impl GuessOutcome {
    /// Whether this guess was appended to the session.
    pub fn was_accepted(&self) -> bool {
        !matches!(self, Self::Repeated | Self::NotActive)
    }

    pub fn ends_game(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Stopped early enough to carry no penalty.
    Stopped,
    /// Too far along; the stop is booked as a loss.
    Lost,
    NotActive,
}

/// One play-through of the game for one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    status: GameStatus,
    guesses: Vec<Guess>,
    lives_left: u32,
    secret_word: String,
    #[serde(default = "Utc::now")]
    started_at: DateTime<Utc>,
}

impl GameSession {
    /// Start a new active session. The word is uppercased and must be longer
    /// than four letters, all of them A-Z.
    pub fn new(secret_word: impl Into<String>) -> Result<Self> {
        let secret_word = secret_word.into().to_uppercase();
        if secret_word.chars().count() <= MIN_WORD_LEN
            || !secret_word.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(HangmanError::dictionary(format!(
                "unusable secret word {:?}",
                secret_word
            )));
        }

        Ok(Self {
            status: GameStatus::Active,
            guesses: Vec::with_capacity(26),
            lives_left: STARTING_LIVES,
            secret_word,
            started_at: Utc::now(),
        })
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn guesses(&self) -> &[Guess] {
        &self.guesses
    }

    pub fn lives_left(&self) -> u32 {
        self.lives_left
    }

    pub fn secret_word(&self) -> &str {
        &self.secret_word
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn has_guessed(&self, letter: char) -> bool {
        let letter = letter.to_ascii_uppercase();
        self.guesses.iter().any(|g| g.letter == letter)
    }

    fn is_fully_revealed(&self) -> bool {
        self.secret_word.chars().all(|c| self.has_guessed(c))
    }

    /// Record a guess by `author`.
    pub fn record_guess(mut self, author: UserId, letter: char) -> (Self, GuessOutcome) {
        if !self.is_active() {
            return (self, GuessOutcome::NotActive);
        }

        let letter = letter.to_ascii_uppercase();
        if self.has_guessed(letter) {
            return (self, GuessOutcome::Repeated);
        }

        let correct = self.secret_word.contains(letter);
        self.guesses.push(Guess {
            author,
            letter,
            correct,
        });

        let outcome = if self.is_fully_revealed() {
            self.status = GameStatus::Won;
            GuessOutcome::Won
        } else if correct {
            GuessOutcome::Correct
        } else if self.lives_left > 1 {
            self.lives_left -= 1;
            GuessOutcome::Incorrect
        } else {
            // Last life: the session ends, the counter is left as is.
            self.status = GameStatus::Lost;
            GuessOutcome::Lost
        };

        (self, outcome)
    }

    /// Stop the game on request.
    pub fn stop(mut self) -> (Self, StopOutcome) {
        if !self.is_active() {
            return (self, StopOutcome::NotActive);
        }

        if self.lives_left > MERCY_STOP_THRESHOLD {
            self.status = GameStatus::Stopped;
            (self, StopOutcome::Stopped)
        } else {
            self.status = GameStatus::Lost;
            (self, StopOutcome::Lost)
        }
    }

    /// The secret word with every unguessed letter masked.
    pub fn render(&self) -> String {
        self.secret_word
            .chars()
            .map(|c| if self.has_guessed(c) { c } else { MASK })
            .collect()
    }
}

/// Accept a chat message as a guess: exactly one basic Latin letter, any case.
pub fn parse_guess(text: &str) -> Result<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(HangmanError::InvalidInput {
            input: text.to_string(),
        }),
    }
}
