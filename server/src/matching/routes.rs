//! REST endpoints for the recommendation feed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::middleware::Claims;
use crate::error::ApiError;
use crate::matching::engine::{self, Recommendation};
use crate::state::AppState;

/// GET /api/recommendations — Ranked candidate list for the caller.
pub async fn get_recommendations(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let recommendations = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        engine::recommend(&conn, &user_id)
    })
    .await??;

    Ok(Json(recommendations))
}

/// POST /api/recommendations/{target_id}/hide — Record a pass on a target.
/// Repeating the call for the same target is a silent no-op.
pub async fn hide_user(
    State(state): State<AppState>,
    claims: Claims,
    Path(target_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            rusqlite::params![target_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(ApiError::NotFound("user"));
        }

        engine::hide(&conn, &user_id, &target_id)
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
