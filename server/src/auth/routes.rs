//! Registration and login endpoints.
//!
//! The original identity flow lives upstream; these handlers only map an
//! email to a user id and hand out a signed token. No password verification
//! happens in this service (pass_hash is owned by the external auth system).

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// POST /api/auth/register — Create a user (and an empty profile) and issue a token.
/// Duplicate email is rejected with no partial effect.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::InvalidOperation("email must not be empty"));
    }

    let db = state.db.clone();
    let user_id = tokio::task::spawn_blocking(move || {
        let mut conn = db.lock().map_err(|_| ApiError::Internal)?;
        // User and profile rows land in one transaction: a failure between
        // the inserts must not leave a user the profile join cannot resolve.
        let tx = conn.transaction().map_err(ApiError::from)?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                rusqlite::params![email],
                |row| row.get(0),
            )
            .map_err(ApiError::from)?;
        if exists {
            return Err(ApiError::InvalidOperation("user already exists"));
        }

        let user_id = uuid::Uuid::now_v7().to_string();
        let now = db::now_ts();
        tx.execute(
            "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, email, now],
        )
        .map_err(ApiError::from)?;
        tx.execute(
            "INSERT INTO profiles (user_id) VALUES (?1)",
            rusqlite::params![user_id],
        )
        .map_err(ApiError::from)?;
        tx.commit().map_err(ApiError::from)?;

        Ok(user_id)
    })
    .await??;

    let access_token = crate::auth::jwt::issue_access_token(&state.jwt_secret, &user_id)
        .map_err(|err| {
            tracing::error!(error = %err, "failed to sign access token");
            ApiError::Internal
        })?;

    tracing::info!(user_id = %user_id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        }),
    ))
}

/// POST /api/auth/login — Look up a user by email and issue a token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = body.email.trim().to_lowercase();

    let db = state.db.clone();
    let user_id = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        conn.query_row(
            "SELECT id FROM users WHERE email = ?1",
            rusqlite::params![email],
            |row| row.get::<_, String>(0),
        )
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound("user"),
            other => ApiError::from(other),
        })
    })
    .await??;

    let access_token = crate::auth::jwt::issue_access_token(&state.jwt_secret, &user_id)
        .map_err(|err| {
            tracing::error!(error = %err, "failed to sign access token");
            ApiError::Internal
        })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}
