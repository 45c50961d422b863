//! Interest catalog and per-user interest selection.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InterestResponse {
    pub id: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceInterestsRequest {
    pub interest_ids: Vec<String>,
}

fn query_interests(
    conn: &rusqlite::Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<InterestResponse>, ApiError> {
    let mut stmt = conn.prepare(sql)?;
    let interests = stmt
        .query_map(params, |row| {
            Ok(InterestResponse {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(interests)
}

/// GET /api/survey/interests — The whole catalog.
pub async fn list_interests(
    State(state): State<AppState>,
) -> Result<Json<Vec<InterestResponse>>, ApiError> {
    let db = state.db.clone();
    let interests = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        query_interests(
            &conn,
            "SELECT id, name, category FROM interests ORDER BY name",
            [],
        )
    })
    .await??;

    Ok(Json(interests))
}

/// GET /api/survey/me/interests — The caller's current selection.
pub async fn my_interests(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<InterestResponse>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let interests = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        query_interests(
            &conn,
            "SELECT i.id, i.name, i.category FROM interests i
             JOIN user_interests ui ON ui.interest_id = i.id
             WHERE ui.user_id = ?1
             ORDER BY i.name",
            rusqlite::params![user_id],
        )
    })
    .await??;

    Ok(Json(interests))
}

/// PUT /api/survey/me/interests — Replace the caller's selection in one
/// transaction. Unknown interest ids are skipped; an empty selection is
/// rejected before anything is written.
pub async fn replace_my_interests(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<ReplaceInterestsRequest>,
) -> Result<Json<Vec<InterestResponse>>, ApiError> {
    if body.interest_ids.is_empty() {
        return Err(ApiError::InvalidOperation(
            "at least one interest must be selected",
        ));
    }

    let db = state.db.clone();
    let user_id = claims.sub;

    let interests = tokio::task::spawn_blocking(move || {
        let mut conn = db.lock().map_err(|_| ApiError::Internal)?;

        let tx = conn.transaction().map_err(ApiError::from)?;
        tx.execute(
            "DELETE FROM user_interests WHERE user_id = ?1",
            rusqlite::params![user_id],
        )?;
        for interest_id in &body.interest_ids {
            // Skip ids that are not in the catalog
            tx.execute(
                "INSERT OR IGNORE INTO user_interests (user_id, interest_id)
                 SELECT ?1, id FROM interests WHERE id = ?2",
                rusqlite::params![user_id, interest_id],
            )?;
        }
        tx.commit().map_err(ApiError::from)?;

        query_interests(
            &conn,
            "SELECT i.id, i.name, i.category FROM interests i
             JOIN user_interests ui ON ui.interest_id = i.id
             WHERE ui.user_id = ?1
             ORDER BY i.name",
            rusqlite::params![user_id],
        )
    })
    .await??;

    Ok(Json(interests))
}
