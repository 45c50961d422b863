//! Recommendation computation and pass recording.
//!
//! Read path: load the requester's interest set, drop self and every target
//! they have passed on, score the rest, keep positive scores, sort by score
//! descending. Ties keep candidate registration order — candidates are
//! retrieved ordered by (created_at, id) and the sort is stable.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::error::ApiError;
use crate::matching::score::compatibility;

/// A scored candidate with the profile summary shown in the feed.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub about: Option<String>,
    pub avatar_url: Option<String>,
    pub compatibility: u32,
}

/// Compute the ranked candidate list for a user. Read-only.
/// An unknown user id yields an empty list, not an error.
pub fn recommend(conn: &Connection, user_id: &str) -> Result<Vec<Recommendation>, ApiError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        rusqlite::params![user_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(Vec::new());
    }

    let interests_by_user = load_interest_sets(conn)?;
    let my_interests = interests_by_user.get(user_id).cloned().unwrap_or_default();
    let passed = load_passed_targets(conn, user_id)?;

    // Candidates in registration order — this is the tie-break order.
    let mut stmt = conn.prepare(
        "SELECT u.id, p.first_name, p.last_name, p.city, p.about, p.avatar_url
         FROM users u
         LEFT JOIN profiles p ON p.user_id = u.id
         WHERE u.id != ?1
         ORDER BY u.created_at, u.id",
    )?;
    let candidates = stmt
        .query_map(rusqlite::params![user_id], |row| {
            Ok(Recommendation {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                city: row.get(3)?,
                about: row.get(4)?,
                avatar_url: row.get(5)?,
                compatibility: 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    static EMPTY: std::sync::OnceLock<HashSet<String>> = std::sync::OnceLock::new();
    let empty = EMPTY.get_or_init(HashSet::new);

    let mut scored: Vec<Recommendation> = candidates
        .into_iter()
        .filter(|candidate| !passed.contains(&candidate.id))
        .filter_map(|mut candidate| {
            let theirs = interests_by_user.get(&candidate.id).unwrap_or(empty);
            let score = compatibility(&my_interests, theirs);
            // Zero overlap is not a recommendation
            if score == 0 {
                return None;
            }
            candidate.compatibility = score;
            Some(candidate)
        })
        .collect();

    // Stable sort: equal scores keep registration order
    scored.sort_by(|a, b| b.compatibility.cmp(&a.compatibility));

    Ok(scored)
}

/// Record a pass interaction for (actor, target), idempotently: a second
/// hide of the same target is a silent no-op. The partial unique index on
/// pass rows makes INSERT OR IGNORE safe under concurrent calls.
pub fn hide(conn: &Connection, actor_id: &str, target_id: &str) -> Result<(), ApiError> {
    conn.execute(
        "INSERT OR IGNORE INTO interactions (id, actor_id, target_id, kind, created_at)
         VALUES (?1, ?2, ?3, 'pass', ?4)",
        rusqlite::params![uuid::Uuid::now_v7().to_string(), actor_id, target_id, db::now_ts()],
    )?;
    Ok(())
}

/// Interest-id sets for every user with at least one interest.
fn load_interest_sets(conn: &Connection) -> Result<HashMap<String, HashSet<String>>, ApiError> {
    let mut stmt = conn.prepare("SELECT user_id, interest_id FROM user_interests")?;
    let mut sets: HashMap<String, HashSet<String>> = HashMap::new();
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (user_id, interest_id) = row?;
        sets.entry(user_id).or_default().insert(interest_id);
    }
    Ok(sets)
}

/// Targets the user has passed on. Suppression lasts exactly as long as the
/// pass row exists, independent of later interest changes.
fn load_passed_targets(conn: &Connection, user_id: &str) -> Result<HashSet<String>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT target_id FROM interactions WHERE actor_id = ?1 AND kind = 'pass'",
    )?;
    let targets = stmt
        .query_map(rusqlite::params![user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db_in_memory;

    fn seed_user(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, format!("{id}@example.com"), db::now_ts()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO profiles (user_id) VALUES (?1)",
            rusqlite::params![id],
        )
        .unwrap();
    }

    fn seed_interest(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO interests (id, name) VALUES (?1, ?1)",
            rusqlite::params![id],
        )
        .unwrap();
    }

    fn pick(conn: &Connection, user_id: &str, interests: &[&str]) {
        for interest in interests {
            conn.execute(
                "INSERT INTO user_interests (user_id, interest_id) VALUES (?1, ?2)",
                rusqlite::params![user_id, interest],
            )
            .unwrap();
        }
    }

    fn setup() -> Connection {
        let conn = init_db_in_memory().unwrap();
        for interest in ["sport", "music", "travel", "books"] {
            seed_interest(&conn, interest);
        }
        conn
    }

    #[test]
    fn unknown_user_gets_an_empty_list() {
        let conn = setup();
        assert!(recommend(&conn, "nobody").unwrap().is_empty());
    }

    #[test]
    fn scores_and_ranks_candidates() {
        let conn = setup();
        seed_user(&conn, "me");
        seed_user(&conn, "partial");
        seed_user(&conn, "perfect");
        seed_user(&conn, "disjoint");
        pick(&conn, "me", &["sport", "music"]);
        pick(&conn, "partial", &["sport", "travel"]); // 1/3 -> 33
        pick(&conn, "perfect", &["sport", "music"]); // 2/2 -> 100
        pick(&conn, "disjoint", &["books"]); // 0 -> excluded

        let recs = recommend(&conn, "me").unwrap();
        let ids: Vec<&str> = recs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["perfect", "partial"]);
        assert_eq!(recs[0].compatibility, 100);
        assert_eq!(recs[1].compatibility, 33);
    }

    #[test]
    fn never_recommends_self_or_passed_targets() {
        let conn = setup();
        seed_user(&conn, "me");
        seed_user(&conn, "other");
        pick(&conn, "me", &["sport"]);
        pick(&conn, "other", &["sport"]);

        assert_eq!(recommend(&conn, "me").unwrap().len(), 1);

        hide(&conn, "me", "other").unwrap();
        assert!(recommend(&conn, "me").unwrap().is_empty());
        assert!(!recommend(&conn, "me")
            .unwrap()
            .iter()
            .any(|r| r.id == "me"));
    }

    #[test]
    fn hide_is_idempotent() {
        let conn = setup();
        seed_user(&conn, "me");
        seed_user(&conn, "other");

        hide(&conn, "me", "other").unwrap();
        hide(&conn, "me", "other").unwrap();

        let passes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM interactions
                 WHERE actor_id = 'me' AND target_id = 'other' AND kind = 'pass'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(passes, 1);
    }

    #[test]
    fn equal_scores_keep_registration_order() {
        let conn = setup();
        seed_user(&conn, "me");
        seed_user(&conn, "first");
        seed_user(&conn, "second");
        pick(&conn, "me", &["sport", "music"]);
        pick(&conn, "first", &["sport"]);
        pick(&conn, "second", &["music"]);

        let recs = recommend(&conn, "me").unwrap();
        let ids: Vec<&str> = recs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn empty_interest_set_yields_no_matches() {
        let conn = setup();
        seed_user(&conn, "me");
        seed_user(&conn, "other");
        pick(&conn, "other", &["music"]);

        // union is non-empty but intersection is 0 for every candidate
        assert!(recommend(&conn, "me").unwrap().is_empty());
    }
}
