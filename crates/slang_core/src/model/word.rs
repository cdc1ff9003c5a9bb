//! Slang word domain model.
//!
//! # Responsibility
//! - Define the canonical word record and its derived score.
//! - Validate submitted text before it reaches a store.
//!
//! # Invariants
//! - `id` is `None` only for drafts that have not been persisted.
//! - `upvotes`/`downvotes` are never decremented.
//! - Words created by [`SYSTEM_CREATOR_ID`] are system/seed words.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned word identifier.
pub type WordId = String;

/// Reserved creator id for built-in and curated words.
pub const SYSTEM_CREATOR_ID: &str = "system";

/// Vote counter targeted by a vote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteField {
    Upvotes,
    Downvotes,
}

impl VoteField {
    /// Document field name of this counter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upvotes => "upvotes",
            Self::Downvotes => "downvotes",
        }
    }
}

/// Validation failures for submitted words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordValidationError {
    EmptyText,
    EmptyDefinition,
}

impl Display for WordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "word cannot be empty"),
            Self::EmptyDefinition => write!(f, "definition cannot be empty"),
        }
    }
}

impl Error for WordValidationError {}

/// Canonical slang word record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    /// Store-assigned ID; `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WordId>,
    /// Serialized as `word` to match the document schema.
    #[serde(rename = "word")]
    pub text: String,
    pub definition: String,
    pub created_by: String,
    /// Creator display name, serialized as `username`.
    #[serde(rename = "username")]
    pub creator_name: String,
    pub upvotes: u32,
    pub downvotes: u32,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Word {
    /// Creates an unpersisted draft with zeroed vote counters.
    ///
    /// Text and definition are trimmed; validation is left to [`Word::validate`].
    pub fn draft(
        text: &str,
        definition: &str,
        created_by: impl Into<String>,
        creator_name: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: None,
            text: text.trim().to_string(),
            definition: definition.trim().to_string(),
            created_by: created_by.into(),
            creator_name: creator_name.into(),
            upvotes: 0,
            downvotes: 0,
            created_at,
        }
    }

    /// Returns a copy of this word carrying a store-assigned ID.
    pub fn with_id(mut self, id: impl Into<WordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Checks the submission invariants.
    ///
    /// # Errors
    /// - `EmptyText` when the word is blank.
    /// - `EmptyDefinition` when the definition is blank.
    pub fn validate(&self) -> Result<(), WordValidationError> {
        if self.text.trim().is_empty() {
            return Err(WordValidationError::EmptyText);
        }
        if self.definition.trim().is_empty() {
            return Err(WordValidationError::EmptyDefinition);
        }
        Ok(())
    }

    /// Net score: upvotes minus downvotes.
    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }

    pub fn is_system(&self) -> bool {
        self.created_by == SYSTEM_CREATOR_ID
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Increments one counter locally, saturating at `u32::MAX`.
    pub fn record_vote(&mut self, field: VoteField) {
        match field {
            VoteField::Upvotes => self.upvotes = self.upvotes.saturating_add(1),
            VoteField::Downvotes => self.downvotes = self.downvotes.saturating_add(1),
        }
    }
}
