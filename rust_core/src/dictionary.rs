//! Secret word source.
//!
//! `WordListDictionary` loads a newline separated word file once and keeps only
//! words a game can actually be played with: longer than four letters, no
//! apostrophe, nothing outside A-Z once uppercased.

use rand::seq::SliceRandom;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{HangmanError, Result};
use crate::game::MIN_WORD_LEN;

pub trait Dictionary: Send + Sync {
    /// Pick a playable uppercase word.
    fn pick_word(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct WordListDictionary {
    words: Vec<String>,
}

impl WordListDictionary {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| HangmanError::DictionaryUnavailable {
            reason: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })?;

        let dictionary = Self::from_words(content.lines());
        info!(
            "Loaded {} playable words from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .filter_map(|w| normalize(w.as_ref()))
            .collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn normalize(raw: &str) -> Option<String> {
    let word = raw.trim();
    if word.contains('\'') || word.chars().count() <= MIN_WORD_LEN {
        return None;
    }
    let word = word.to_uppercase();
    word.chars().all(|c| c.is_ascii_uppercase()).then_some(word)
}

impl Dictionary for WordListDictionary {
    fn pick_word(&self) -> Result<String> {
        self.words
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| HangmanError::dictionary("word list has no playable words"))
    }
}

/// Always hands out the same word. Handy for tests and demos.
#[derive(Debug, Clone)]
pub struct FixedDictionary(pub String);

impl FixedDictionary {
    pub fn new(word: impl Into<String>) -> Self {
        Self(word.into().to_uppercase())
    }
}

impl Dictionary for FixedDictionary {
    fn pick_word(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
