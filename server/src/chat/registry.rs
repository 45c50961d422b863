//! Store operations for direct chats and their messages.
//!
//! Chat identity is the unordered participant pair. `canonical_pair` defines
//! the one total order (lexicographic over user ids) used both at lookup and
//! at insert, so swapped argument order can never produce a second row. The
//! UNIQUE(user_lo, user_hi) index is the enforcement backstop: if two callers
//! race past the lookup, the losing insert hits the constraint and we re-read
//! the winner's row instead of surfacing an error.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::{self, models::Chat};
use crate::error::ApiError;

/// A persisted message, in the exact shape both the history endpoint and the
/// live broadcast serialize. Keeping one struct for both paths is what makes
/// a pushed payload byte-identical to its history representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl MessageRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            author_id: row.get(2)?,
            text: row.get(3)?,
            created_at: row.get(4)?,
            edited_at: row.get(5)?,
            deleted_at: row.get(6)?,
        })
    }
}

const CHAT_COLUMNS: &str = "id, user_lo, user_hi, created_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, author_id, text, created_at, edited_at, deleted_at";

/// Order the unordered pair {a, b} into the canonical (lo, hi) form.
/// Rejects a self-pair — a user may not chat with themselves.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> Result<(&'a str, &'a str), ApiError> {
    if a == b {
        return Err(ApiError::InvalidOperation(
            "cannot open a direct chat with yourself",
        ));
    }
    if a < b {
        Ok((a, b))
    } else {
        Ok((b, a))
    }
}

/// Resolve the direct chat between two users, creating it on first access.
pub fn get_or_create_direct_chat(conn: &Connection, a: &str, b: &str) -> Result<Chat, ApiError> {
    let (lo, hi) = canonical_pair(a, b)?;

    if let Some(chat) = find_by_pair(conn, lo, hi)? {
        return Ok(chat);
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = db::now_ts();
    let inserted = conn.execute(
        "INSERT INTO chats (id, user_lo, user_hi, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, lo, hi, now],
    );

    match inserted {
        Ok(_) => Ok(Chat {
            id,
            user_lo: lo.to_string(),
            user_hi: hi.to_string(),
            created_at: now,
        }),
        // A concurrent caller won the insert race — the unique pair index
        // rejected ours, so the row exists now. Re-read it.
        Err(err) if is_unique_violation(&err) => {
            find_by_pair(conn, lo, hi)?.ok_or(ApiError::Internal)
        }
        Err(err) => Err(ApiError::from(err)),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn find_by_pair(conn: &Connection, lo: &str, hi: &str) -> Result<Option<Chat>, ApiError> {
    let chat = conn
        .query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE user_lo = ?1 AND user_hi = ?2"),
            rusqlite::params![lo, hi],
            Chat::from_row,
        )
        .optional()?;
    Ok(chat)
}

pub fn get_chat_by_id(conn: &Connection, chat_id: &str) -> Result<Option<Chat>, ApiError> {
    let chat = conn
        .query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
            rusqlite::params![chat_id],
            Chat::from_row,
        )
        .optional()?;
    Ok(chat)
}

/// All chats the user participates in, oldest first.
pub fn list_chats_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Chat>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHAT_COLUMNS} FROM chats
         WHERE user_lo = ?1 OR user_hi = ?1
         ORDER BY created_at, id"
    ))?;
    let chats = stmt
        .query_map(rusqlite::params![user_id], Chat::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(chats)
}

/// Messages of a chat in ascending creation order. The (created_at, id)
/// ordering is total: timestamps are fixed-width microsecond RFC 3339 and
/// ids are UUIDv7, so same-instant messages still compare consistently.
pub fn list_messages(conn: &Connection, chat_id: &str) -> Result<Vec<MessageRecord>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE chat_id = ?1
         ORDER BY created_at, id"
    ))?;
    let messages = stmt
        .query_map(rusqlite::params![chat_id], MessageRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

/// The most recent message of a chat, if any.
pub fn last_message(conn: &Connection, chat_id: &str) -> Result<Option<MessageRecord>, ApiError> {
    let message = conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE chat_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1"
            ),
            rusqlite::params![chat_id],
            MessageRecord::from_row,
        )
        .optional()?;
    Ok(message)
}

/// Persist a new message and return it in wire shape.
pub fn append_message(
    conn: &Connection,
    chat_id: &str,
    author_id: &str,
    text: &str,
) -> Result<MessageRecord, ApiError> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = db::now_ts();
    conn.execute(
        "INSERT INTO messages (id, chat_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id, chat_id, author_id, text, now],
    )?;

    Ok(MessageRecord {
        id,
        chat_id: chat_id.to_string(),
        author_id: author_id.to_string(),
        text: text.to_string(),
        created_at: now,
        edited_at: None,
        deleted_at: None,
    })
}
