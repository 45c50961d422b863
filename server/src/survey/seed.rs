//! Seed the interest catalog on first boot.

use crate::db::DbPool;

/// Catalog entries inserted when the interests table is empty.
/// Immutable after seeding; matching only ever references the ids.
const INITIAL_INTERESTS: &[(&str, &str)] = &[
    ("Programming", "Tech"),
    ("Science", "Tech"),
    ("Video Games", "Tech"),
    ("Movies", "Culture"),
    ("Music", "Culture"),
    ("Books", "Culture"),
    ("Art", "Culture"),
    ("Theatre", "Culture"),
    ("Photography", "Culture"),
    ("Sport", "Active"),
    ("Yoga", "Active"),
    ("Travel", "Active"),
    ("Board Games", "Social"),
    ("Cooking", "Social"),
    ("Psychology", "Social"),
];

/// Insert the initial catalog if the table is empty; otherwise leave it alone.
pub fn seed_interests(db: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM interests", [], |row| row.get(0))?;
    if count > 0 {
        tracing::info!("Interest catalog already seeded ({} entries)", count);
        return Ok(());
    }

    for (name, category) in INITIAL_INTERESTS {
        conn.execute(
            "INSERT INTO interests (id, name, category) VALUES (?1, ?2, ?3)",
            rusqlite::params![uuid::Uuid::now_v7().to_string(), name, category],
        )?;
    }

    tracing::info!("Seeded {} interests", INITIAL_INTERESTS.len());
    Ok(())
}
