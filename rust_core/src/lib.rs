//! Hangman Core - session state and chat plumbing for the hangman bot.
//!
//! This crate provides:
//! - The per-game state machine (guesses, masked word, win/loss)
//! - A locked per-chat session store with snapshot/restore
//! - JSON snapshot persistence and the periodic snapshot loop
//! - Word list dictionary
//! - Shutdown coordination for every long-running loop
//! - Chat transports (Telegram Bot API, in-memory)

pub mod clients;
pub mod dictionary;
pub mod error;
pub mod game;
pub mod models;
pub mod persistence;
pub mod shutdown;
pub mod store;

pub use dictionary::{Dictionary, FixedDictionary, WordListDictionary};
pub use error::{HangmanError, Result};
pub use game::{parse_guess, GameSession, GameStatus, Guess, GuessOutcome, StopOutcome};
pub use persistence::{JsonSnapshotStore, SnapshotStore};
pub use shutdown::{ShutdownCoordinator, ShutdownReason};
pub use store::{ChatStats, SessionStore, Snapshot};
