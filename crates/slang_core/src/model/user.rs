//! User record keyed by the auth identity.

use crate::model::word::{VoteField, WordId};
use serde::{Deserialize, Serialize};

/// Identifier owned by the auth provider.
pub type UserId = String;

/// One of the per-user word id lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserList {
    #[serde(rename = "createdWords")]
    Created,
    #[serde(rename = "likedWords")]
    Liked,
    #[serde(rename = "dislikedWords")]
    Disliked,
}

impl UserList {
    /// Document field name of this list.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "createdWords",
            Self::Liked => "likedWords",
            Self::Disliked => "dislikedWords",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdWords" => Some(Self::Created),
            "likedWords" => Some(Self::Liked),
            "dislikedWords" => Some(Self::Disliked),
            _ => None,
        }
    }

    /// List that records a vote on `field`.
    pub fn for_vote(field: VoteField) -> Self {
        match field {
            VoteField::Upvotes => Self::Liked,
            VoteField::Downvotes => Self::Disliked,
        }
    }
}

/// User document.
///
/// List fields keep insertion order but never contain duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Serialized as `username` to match the document schema.
    #[serde(rename = "username")]
    pub display_name: String,
    #[serde(default)]
    pub created_words: Vec<WordId>,
    #[serde(default)]
    pub liked_words: Vec<WordId>,
    #[serde(default)]
    pub disliked_words: Vec<WordId>,
}

impl User {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            created_words: Vec::new(),
            liked_words: Vec::new(),
            disliked_words: Vec::new(),
        }
    }

    pub fn list(&self, list: UserList) -> &[WordId] {
        match list {
            UserList::Created => &self.created_words,
            UserList::Liked => &self.liked_words,
            UserList::Disliked => &self.disliked_words,
        }
    }

    /// Set-union insert. Returns `false` when `word_id` was already present.
    pub fn add_to_list(&mut self, list: UserList, word_id: &str) -> bool {
        let target = match list {
            UserList::Created => &mut self.created_words,
            UserList::Liked => &mut self.liked_words,
            UserList::Disliked => &mut self.disliked_words,
        };
        if target.iter().any(|existing| existing == word_id) {
            return false;
        }
        target.push(word_id.to_string());
        true
    }

    /// Returns the recorded vote on `word_id`, if any.
    pub fn vote_on(&self, word_id: &str) -> Option<VoteField> {
        if self.liked_words.iter().any(|id| id == word_id) {
            Some(VoteField::Upvotes)
        } else if self.disliked_words.iter().any(|id| id == word_id) {
            Some(VoteField::Downvotes)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserList};
    use crate::model::word::VoteField;

    #[test]
    fn add_to_list_has_set_semantics() {
        let mut user = User::new("u1", "User1234");
        assert!(user.add_to_list(UserList::Liked, "w1"));
        assert!(!user.add_to_list(UserList::Liked, "w1"));
        assert_eq!(user.list(UserList::Liked), ["w1".to_string()]);
        assert_eq!(user.vote_on("w1"), Some(VoteField::Upvotes));
        assert_eq!(user.vote_on("w2"), None);
    }

    #[test]
    fn list_names_roundtrip() {
        for list in [UserList::Created, UserList::Liked, UserList::Disliked] {
            assert_eq!(UserList::parse(list.as_str()), Some(list));
        }
        assert_eq!(UserList::parse("favorites"), None);
    }

    #[test]
    fn document_lists_default_to_empty() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "username": "User1234",
            "likedWords": ["w1"]
        }))
        .unwrap();
        assert_eq!(user.display_name, "User1234");
        assert!(user.created_words.is_empty());
        assert_eq!(user.vote_on("w1"), Some(VoteField::Upvotes));

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["dislikedWords"], serde_json::json!([]));
        assert_eq!(
            serde_json::to_value(UserList::Created).unwrap(),
            UserList::Created.as_str()
        );
    }
}
