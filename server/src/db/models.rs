//! Database row types shared across handler modules.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use rusqlite::Row;

/// Direct chat between two users, participants stored as the canonical
/// (lexicographically ordered) pair.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: String,
    pub user_lo: String,
    pub user_hi: String,
    pub created_at: String,
}

impl Chat {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_lo: row.get(1)?,
            user_hi: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    /// Whether the given user is one of the two participants.
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user_lo == user_id || self.user_hi == user_id
    }

    /// The participant other than `user_id`.
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.user_lo == user_id {
            &self.user_hi
        } else {
            &self.user_lo
        }
    }
}
