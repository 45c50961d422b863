//! Profile read and update endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub telegram: Option<String>,
    pub about: Option<String>,
    pub avatar_url: Option<String>,
    pub visibility: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: String,
    pub profile: ProfileResponse,
}

/// Partial profile update: absent fields are left untouched.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub telegram: Option<String>,
    pub about: Option<String>,
    pub avatar_url: Option<String>,
    pub visibility: Option<String>,
}

fn load_user(conn: &rusqlite::Connection, user_id: &str) -> Result<UserResponse, ApiError> {
    conn.query_row(
        "SELECT u.id, u.email, u.role,
                p.first_name, p.last_name, p.city, p.telegram, p.about, p.avatar_url, p.visibility
         FROM users u
         JOIN profiles p ON p.user_id = u.id
         WHERE u.id = ?1",
        rusqlite::params![user_id],
        |row| {
            Ok(UserResponse {
                id: row.get(0)?,
                email: row.get(1)?,
                role: row.get(2)?,
                profile: ProfileResponse {
                    first_name: row.get(3)?,
                    last_name: row.get(4)?,
                    city: row.get(5)?,
                    telegram: row.get(6)?,
                    about: row.get(7)?,
                    avatar_url: row.get(8)?,
                    visibility: row.get(9)?,
                },
            })
        },
    )
    .map_err(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound("user"),
        other => ApiError::from(other),
    })
}

/// GET /api/users/me
pub async fn get_me(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<UserResponse>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        load_user(&conn, &user_id)
    })
    .await??;

    Ok(Json(user))
}

/// PATCH /api/users/me — Update the caller's profile fields.
pub async fn update_me(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<ProfileUpdateRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if let Some(visibility) = &body.visibility {
        if !matches!(visibility.as_str(), "all" | "matched" | "none") {
            return Err(ApiError::InvalidOperation(
                "visibility must be one of: all, matched, none",
            ));
        }
    }

    let db = state.db.clone();
    let user_id = claims.sub;

    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;

        let updated = conn.execute(
            "UPDATE profiles SET
                first_name = COALESCE(?2, first_name),
                last_name = COALESCE(?3, last_name),
                city = COALESCE(?4, city),
                telegram = COALESCE(?5, telegram),
                about = COALESCE(?6, about),
                avatar_url = COALESCE(?7, avatar_url),
                visibility = COALESCE(?8, visibility)
             WHERE user_id = ?1",
            rusqlite::params![
                user_id,
                body.first_name,
                body.last_name,
                body.city,
                body.telegram,
                body.about,
                body.avatar_url,
                body.visibility,
            ],
        )?;
        if updated == 0 {
            return Err(ApiError::NotFound("profile"));
        }

        load_user(&conn, &user_id)
    })
    .await??;

    Ok(Json(user))
}
