//! In-process word store.
//!
//! # Responsibility
//! - Back the feed with a process-local document set (CLI, previews, tests).
//!
//! # Invariants
//! - All mutations happen under one mutex, so increments are atomic.
//! - Orderings match the SQLite backend: `created_at DESC, id ASC` for
//!   recency and `upvotes DESC, created_at DESC, id ASC` for top words.

use super::{missing_user, missing_word, new_word_id, StoreError, StoreResult, WordStore};
use crate::model::user::{User, UserList};
use crate::model::word::{VoteField, Word, WordId};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    words: Vec<Word>,
    users: HashMap<String, User>,
}

/// Mutex-guarded in-memory implementation of [`WordStore`].
#[derive(Default)]
pub struct InMemoryWordStore {
    state: Mutex<MemoryState>,
}

impl InMemoryWordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with persisted words.
    ///
    /// Words without an ID are assigned one.
    pub fn with_words(words: impl IntoIterator<Item = Word>) -> Self {
        let words = words
            .into_iter()
            .map(|word| match word.id {
                Some(_) => word,
                None => word.with_id(new_word_id()),
            })
            .collect();
        Self {
            state: Mutex::new(MemoryState {
                words,
                users: HashMap::new(),
            }),
        }
    }

    pub fn word_count(&self) -> usize {
        self.lock().map(|state| state.words.len()).unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn by_recency(a: &Word, b: &Word) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn by_age(a: &Word, b: &Word) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn by_upvotes(a: &Word, b: &Word) -> Ordering {
    b.upvotes.cmp(&a.upvotes).then_with(|| by_recency(a, b))
}

fn take_sorted(
    words: impl Iterator<Item = Word>,
    order: fn(&Word, &Word) -> Ordering,
    limit: Option<u32>,
) -> Vec<Word> {
    let mut selected = words.collect::<Vec<_>>();
    selected.sort_by(order);
    if let Some(limit) = limit {
        selected.truncate(limit as usize);
    }
    selected
}

#[async_trait]
impl WordStore for InMemoryWordStore {
    async fn fetch_recent(&self, limit: u32) -> StoreResult<Vec<Word>> {
        let state = self.lock()?;
        Ok(take_sorted(
            state.words.iter().cloned(),
            by_recency,
            Some(limit),
        ))
    }

    async fn fetch_top(&self, limit: u32) -> StoreResult<Vec<Word>> {
        let state = self.lock()?;
        Ok(take_sorted(
            state.words.iter().cloned(),
            by_upvotes,
            Some(limit),
        ))
    }

    async fn fetch_since(&self, since_ms: i64, limit: u32) -> StoreResult<Vec<Word>> {
        let state = self.lock()?;
        Ok(take_sorted(
            state
                .words
                .iter()
                .filter(|word| word.created_at > since_ms)
                .cloned(),
            by_age,
            Some(limit),
        ))
    }

    async fn fetch_by_creator(&self, user_id: &str) -> StoreResult<Vec<Word>> {
        let state = self.lock()?;
        Ok(take_sorted(
            state
                .words
                .iter()
                .filter(|word| word.created_by == user_id)
                .cloned(),
            by_recency,
            None,
        ))
    }

    async fn create_word(&self, draft: &Word) -> StoreResult<WordId> {
        let id = new_word_id();
        let mut stored = draft.clone().with_id(id.clone());
        stored.upvotes = 0;
        stored.downvotes = 0;
        self.lock()?.words.push(stored);
        Ok(id)
    }

    async fn increment_vote(&self, word_id: &str, field: VoteField) -> StoreResult<()> {
        let mut state = self.lock()?;
        let word = state
            .words
            .iter_mut()
            .find(|word| word.id() == Some(word_id))
            .ok_or_else(|| missing_word(word_id))?;
        word.record_vote(field);
        Ok(())
    }

    async fn append_to_user_list(
        &self,
        user_id: &str,
        list: UserList,
        word_id: &str,
    ) -> StoreResult<()> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| missing_user(user_id))?;
        user.add_to_list(list, word_id);
        Ok(())
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        self.lock()?
            .users
            .entry(user.id.clone())
            .or_insert_with(|| user.clone());
        Ok(())
    }

    async fn fetch_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }
}
