//! Ordered word deck with a viewing cursor.
//!
//! # Invariants
//! - `cursor <= words.len()`; `cursor == words.len()` means exhausted.
//! - Word ids are unique within the deck when every word has an id.

use crate::model::word::{VoteField, Word};
use std::collections::HashSet;

/// Result of moving the cursor past the current word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved to a new current word; `near_end` asks for a prefetch.
    Moved { near_end: bool },
    /// The last word was consumed.
    Exhausted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    words: Vec<Word>,
    cursor: usize,
}

impl Deck {
    pub fn new(words: Vec<Word>) -> Self {
        Self { words, cursor: 0 }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Word> {
        self.words.get(self.cursor)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.words.len()
    }

    /// Replaces all words and rewinds the cursor.
    pub fn replace(&mut self, words: Vec<Word>) {
        self.words = words;
        self.cursor = 0;
    }

    /// Takes the words out, leaving an empty exhausted deck.
    pub fn take_words(&mut self) -> Vec<Word> {
        self.cursor = 0;
        std::mem::take(&mut self.words)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.words.iter().any(|word| word.id() == Some(id))
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.words.iter().position(|word| word.id() == Some(id))
    }

    /// Points the cursor at the word with `id`. Returns `false` when absent.
    pub fn seek(&mut self, id: &str) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    /// Applies a local vote to the word with `id`.
    pub fn record_vote(&mut self, id: &str, field: VoteField) -> bool {
        match self.words.iter_mut().find(|word| word.id() == Some(id)) {
            Some(word) => {
                word.record_vote(field);
                true
            }
            None => false,
        }
    }

    /// Moves past the current word.
    ///
    /// `near_end` is set when at most `prefetch_threshold` words remain,
    /// counting the new current word.
    pub fn advance(&mut self, prefetch_threshold: usize) -> Advance {
        if self.cursor + 1 < self.words.len() {
            self.cursor += 1;
            let remaining = self.words.len() - self.cursor;
            Advance::Moved {
                near_end: remaining <= prefetch_threshold,
            }
        } else {
            self.cursor = self.words.len();
            Advance::Exhausted
        }
    }

    /// Keeps only words whose id is not already in the deck (or earlier in
    /// `incoming`). Words without an id are dropped.
    pub fn filter_unseen(&self, incoming: Vec<Word>) -> Vec<Word> {
        let mut seen = self
            .words
            .iter()
            .filter_map(|word| word.id.clone())
            .collect::<HashSet<_>>();
        incoming
            .into_iter()
            .filter(|word| match word.id.as_ref() {
                Some(id) => seen.insert(id.clone()),
                None => false,
            })
            .collect()
    }
}
