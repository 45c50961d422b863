use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: Initial schema

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    pass_hash TEXT NOT NULL DEFAULT 'none',
    role TEXT NOT NULL DEFAULT 'user',
    created_at TEXT NOT NULL
);

CREATE INDEX idx_users_role ON users(role);

CREATE TABLE profiles (
    user_id TEXT PRIMARY KEY,
    first_name TEXT,
    last_name TEXT,
    city TEXT,
    telegram TEXT,
    about TEXT,
    avatar_url TEXT,
    visibility TEXT NOT NULL DEFAULT 'all'
        CHECK (visibility IN ('all', 'matched', 'none')),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE interests (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL DEFAULT 'Other'
);

CREATE TABLE user_interests (
    user_id TEXT NOT NULL,
    interest_id TEXT NOT NULL,
    PRIMARY KEY (user_id, interest_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (interest_id) REFERENCES interests(id) ON DELETE CASCADE
);

CREATE INDEX idx_user_interests_interest ON user_interests(interest_id, user_id);

-- Append-only interaction history. Multiple rows per ordered (actor, target)
-- pair are allowed, except 'pass' which is recorded at most once — enforced
-- by the partial unique index below so concurrent hides cannot race.
CREATE TABLE interactions (
    id TEXT PRIMARY KEY,
    actor_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('pass', 'like', 'view')),
    created_at TEXT NOT NULL,
    FOREIGN KEY (actor_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX idx_interactions_actor_kind ON interactions(actor_id, kind);
CREATE UNIQUE INDEX idx_interactions_pass_once
    ON interactions(actor_id, target_id) WHERE kind = 'pass';

-- Direct chats. Identity is the unordered participant pair, stored
-- canonicalized: user_lo < user_hi under lexicographic order. The CHECK
-- rules out self-chats at the store layer and the UNIQUE index makes the
-- canonical pair the single source of chat identity.
CREATE TABLE chats (
    id TEXT PRIMARY KEY,
    user_lo TEXT NOT NULL,
    user_hi TEXT NOT NULL,
    created_at TEXT NOT NULL,
    CHECK (user_lo < user_hi),
    UNIQUE (user_lo, user_hi),
    FOREIGN KEY (user_lo) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (user_hi) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX idx_chats_user_lo ON chats(user_lo);
CREATE INDEX idx_chats_user_hi ON chats(user_hi);

CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    author_id TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    edited_at TEXT,
    deleted_at TEXT,
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX idx_messages_chat_created ON messages(chat_id, created_at);
CREATE INDEX idx_messages_author ON messages(author_id);
",
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        migrations().validate().expect("migrations should validate");
    }
}
