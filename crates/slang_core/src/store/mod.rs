//! Word store contracts and backends.
//!
//! # Responsibility
//! - Define the data-access contract the feed controller depends on.
//! - Provide in-memory and SQLite-backed implementations of that contract.
//!
//! # Invariants
//! - `increment_vote` is atomic per call; no read-modify-write across callers.
//! - `append_to_user_list` is idempotent (set union).
//! - Fetches return at most `limit` words in the documented order.

use crate::db::DbError;
use crate::model::user::{User, UserList};
use crate::model::word::{VoteField, Word, WordId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryWordStore;
pub use sqlite::SqliteWordStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Transport and semantic errors reported by a word store.
#[derive(Debug)]
pub enum StoreError {
    /// Backend could not serve the request (network, lock, timeout).
    Unavailable(String),
    /// Target word or user document does not exist.
    NotFound(String),
    /// Persisted document could not be decoded.
    InvalidData(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "word store unavailable: {message}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Data-access contract for word and user documents.
#[async_trait]
pub trait WordStore: Send + Sync + 'static {
    /// Newest words first.
    async fn fetch_recent(&self, limit: u32) -> StoreResult<Vec<Word>>;
    /// Highest upvote counts first.
    async fn fetch_top(&self, limit: u32) -> StoreResult<Vec<Word>>;
    /// Words with `created_at > since_ms`, oldest first.
    ///
    /// Oldest-first lets a caller resume from the last word of a full page.
    async fn fetch_since(&self, since_ms: i64, limit: u32) -> StoreResult<Vec<Word>>;
    /// Words created by `user_id`, newest first.
    async fn fetch_by_creator(&self, user_id: &str) -> StoreResult<Vec<Word>>;
    /// Persists a draft with zeroed counters and returns the assigned ID.
    async fn create_word(&self, draft: &Word) -> StoreResult<WordId>;
    async fn increment_vote(&self, word_id: &str, field: VoteField) -> StoreResult<()>;
    async fn append_to_user_list(
        &self,
        user_id: &str,
        list: UserList,
        word_id: &str,
    ) -> StoreResult<()>;
    /// Creates the user document; an existing document is left untouched.
    async fn create_user(&self, user: &User) -> StoreResult<()>;
    async fn fetch_user(&self, user_id: &str) -> StoreResult<Option<User>>;
}

pub(crate) fn new_word_id() -> WordId {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn missing_user(user_id: &str) -> StoreError {
    StoreError::NotFound(format!("users/{user_id}"))
}

pub(crate) fn missing_word(word_id: &str) -> StoreError {
    StoreError::NotFound(format!("words/{word_id}"))
}
