//! SQLite-backed word store.
//!
//! # Responsibility
//! - Persist words, users and per-user word lists in a local database.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - Vote increments are single `UPDATE ... SET n = n + 1` statements.
//! - `user_word_lists` primary key enforces set semantics per list.
//! - Read paths reject invalid persisted rows instead of masking them.

use super::{missing_user, missing_word, new_word_id, StoreError, StoreResult, WordStore};
use crate::db::{open_db, open_db_in_memory};
use crate::model::user::{User, UserList};
use crate::model::word::{VoteField, Word, WordId};
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const WORD_SELECT_SQL: &str = "SELECT
    id,
    text,
    definition,
    created_by,
    creator_name,
    upvotes,
    downvotes,
    created_at
FROM words";

/// [`WordStore`] over one serialized SQLite connection.
pub struct SqliteWordStore {
    conn: Mutex<Connection>,
}

impl SqliteWordStore {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    fn query_words(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> StoreResult<Vec<Word>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut words = Vec::new();
        while let Some(row) = rows.next()? {
            words.push(parse_word_row(row)?);
        }
        Ok(words)
    }
}

#[async_trait]
impl WordStore for SqliteWordStore {
    async fn fetch_recent(&self, limit: u32) -> StoreResult<Vec<Word>> {
        self.query_words(
            &format!("{WORD_SELECT_SQL} ORDER BY created_at DESC, id ASC LIMIT ?1;"),
            params![limit],
        )
    }

    async fn fetch_top(&self, limit: u32) -> StoreResult<Vec<Word>> {
        self.query_words(
            &format!(
                "{WORD_SELECT_SQL} ORDER BY upvotes DESC, created_at DESC, id ASC LIMIT ?1;"
            ),
            params![limit],
        )
    }

    async fn fetch_since(&self, since_ms: i64, limit: u32) -> StoreResult<Vec<Word>> {
        self.query_words(
            &format!(
                "{WORD_SELECT_SQL}
                 WHERE created_at > ?1
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?2;"
            ),
            params![since_ms, limit],
        )
    }

    async fn fetch_by_creator(&self, user_id: &str) -> StoreResult<Vec<Word>> {
        self.query_words(
            &format!(
                "{WORD_SELECT_SQL}
                 WHERE created_by = ?1
                 ORDER BY created_at DESC, id ASC;"
            ),
            params![user_id],
        )
    }

    async fn create_word(&self, draft: &Word) -> StoreResult<WordId> {
        let id = new_word_id();
        self.conn()?.execute(
            "INSERT INTO words (
                id,
                text,
                definition,
                created_by,
                creator_name,
                upvotes,
                downvotes,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6);",
            params![
                id.as_str(),
                draft.text.as_str(),
                draft.definition.as_str(),
                draft.created_by.as_str(),
                draft.creator_name.as_str(),
                draft.created_at,
            ],
        )?;
        debug!("event=word_insert module=store status=ok backend=sqlite word_id={id}");
        Ok(id)
    }

    async fn increment_vote(&self, word_id: &str, field: VoteField) -> StoreResult<()> {
        let sql = match field {
            VoteField::Upvotes => "UPDATE words SET upvotes = upvotes + 1 WHERE id = ?1;",
            VoteField::Downvotes => "UPDATE words SET downvotes = downvotes + 1 WHERE id = ?1;",
        };
        let changed = self.conn()?.execute(sql, params![word_id])?;
        if changed == 0 {
            return Err(missing_word(word_id));
        }
        Ok(())
    }

    async fn append_to_user_list(
        &self,
        user_id: &str,
        list: UserList,
        word_id: &str,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        if !user_exists(&conn, user_id)? {
            return Err(missing_user(user_id));
        }
        insert_list_entry(&conn, user_id, list, word_id)?;
        Ok(())
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO users (id, display_name) VALUES (?1, ?2);",
            params![user.id.as_str(), user.display_name.as_str()],
        )?;
        if inserted > 0 {
            for list in [UserList::Created, UserList::Liked, UserList::Disliked] {
                for word_id in user.list(list) {
                    insert_list_entry(&tx, &user.id, list, word_id)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn fetch_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        let display_name = conn
            .query_row(
                "SELECT display_name FROM users WHERE id = ?1;",
                params![user_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(display_name) = display_name else {
            return Ok(None);
        };

        let mut user = User::new(user_id, display_name);
        let mut stmt = conn.prepare(
            "SELECT list_name, word_id
             FROM user_word_lists
             WHERE user_id = ?1
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        while let Some(row) = rows.next()? {
            let list_name: String = row.get(0)?;
            let list = UserList::parse(&list_name).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid list name `{list_name}` in user_word_lists.list_name"
                ))
            })?;
            let word_id: String = row.get(1)?;
            user.add_to_list(list, &word_id);
        }
        Ok(Some(user))
    }
}

fn user_exists(conn: &Connection, user_id: &str) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM users WHERE id = ?1;",
            params![user_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_list_entry(
    conn: &Connection,
    user_id: &str,
    list: UserList,
    word_id: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_word_lists (user_id, list_name, word_id, seq)
         SELECT ?1, ?2, ?3, COALESCE(MAX(seq), 0) + 1
         FROM user_word_lists
         WHERE user_id = ?1 AND list_name = ?2;",
        params![user_id, list.as_str(), word_id],
    )?;
    Ok(())
}

fn parse_word_row(row: &Row<'_>) -> StoreResult<Word> {
    let id: String = row.get("id")?;
    let upvotes = parse_counter(row.get("upvotes")?, "upvotes", &id)?;
    let downvotes = parse_counter(row.get("downvotes")?, "downvotes", &id)?;

    Ok(Word {
        id: Some(id),
        text: row.get("text")?,
        definition: row.get("definition")?,
        created_by: row.get("created_by")?,
        creator_name: row.get("creator_name")?,
        upvotes,
        downvotes,
        created_at: row.get("created_at")?,
    })
}

fn parse_counter(value: i64, column: &str, word_id: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid {column} value `{value}` in words.{column} for `{word_id}`"
        ))
    })
}
