//! REST endpoints for direct chats and messages.
//!
//! Access control is enforced here, at the boundary: every handler that
//! resolves a chat or its messages verifies the caller is one of the two
//! participants before touching anything else.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::chat::registry::{self, MessageRecord};
use crate::db::models::Chat;
use crate::error::ApiError;
use crate::state::AppState;
use crate::ws;

/// Message text bounds, matching what clients may submit.
const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Profile summary of the other participant shown in the chat list.
#[derive(Debug, Serialize)]
pub struct ChatParticipant {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatListItem {
    pub id: String,
    pub participant: ChatParticipant,
    pub last_message: Option<MessageRecord>,
}

fn load_participant(
    conn: &rusqlite::Connection,
    user_id: &str,
) -> Result<ChatParticipant, ApiError> {
    let participant = conn.query_row(
        "SELECT u.id, p.first_name, p.last_name, p.avatar_url
         FROM users u
         LEFT JOIN profiles p ON p.user_id = u.id
         WHERE u.id = ?1",
        rusqlite::params![user_id],
        |row| {
            Ok(ChatParticipant {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                avatar_url: row.get(3)?,
            })
        },
    )?;
    Ok(participant)
}

fn to_list_item(
    conn: &rusqlite::Connection,
    chat: &Chat,
    viewer_id: &str,
) -> Result<ChatListItem, ApiError> {
    Ok(ChatListItem {
        id: chat.id.clone(),
        participant: load_participant(conn, chat.other_participant(viewer_id))?,
        last_message: registry::last_message(conn, &chat.id)?,
    })
}

/// Resolve a chat and verify the caller participates in it.
fn authorized_chat(
    conn: &rusqlite::Connection,
    chat_id: &str,
    caller_id: &str,
) -> Result<Chat, ApiError> {
    let chat = registry::get_chat_by_id(conn, chat_id)?.ok_or(ApiError::NotFound("chat"))?;
    if !chat.has_participant(caller_id) {
        return Err(ApiError::AccessDenied);
    }
    Ok(chat)
}

/// GET /api/chats — All chats of the caller with participant and last message.
pub async fn list_chats(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<ChatListItem>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let items = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        let chats = registry::list_chats_for_user(&conn, &user_id)?;
        chats
            .iter()
            .map(|chat| to_list_item(&conn, chat, &user_id))
            .collect::<Result<Vec<_>, _>>()
    })
    .await??;

    Ok(Json(items))
}

/// GET /api/chats/{user_id} — Resolve (or lazily create) the direct chat
/// with that user. The unknown-user case is a NotFound, the self case an
/// InvalidOperation; neither writes anything.
pub async fn get_or_create_chat(
    State(state): State<AppState>,
    claims: Claims,
    Path(other_user_id): Path<String>,
) -> Result<Json<ChatListItem>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let item = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            rusqlite::params![other_user_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(ApiError::NotFound("user"));
        }

        let chat = registry::get_or_create_direct_chat(&conn, &user_id, &other_user_id)?;
        to_list_item(&conn, &chat, &user_id)
    })
    .await??;

    Ok(Json(item))
}

/// GET /api/chats/{chat_id}/messages — Chat history, ascending by creation.
pub async fn list_messages(
    State(state): State<AppState>,
    claims: Claims,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let messages = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        authorized_chat(&conn, &chat_id, &user_id)?;
        registry::list_messages(&conn, &chat_id)
    })
    .await??;

    Ok(Json(messages))
}

/// POST /api/chats/{chat_id}/messages — Persist a message, then fan it out
/// to every live connection of the chat. The broadcast runs strictly after
/// the insert has committed, so a pushed message is always also retrievable
/// via history; delivery misses never affect the stored message or the
/// response.
pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageRecord>), ApiError> {
    if body.text.is_empty() || body.text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::InvalidOperation(
            "message text must be between 1 and 4096 characters",
        ));
    }

    let db = state.db.clone();
    let user_id = claims.sub;
    let chat = chat_id.clone();

    let message = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        authorized_chat(&conn, &chat, &user_id)?;
        registry::append_message(&conn, &chat, &user_id, &body.text)
    })
    .await??;

    ws::broadcast(&state.connections, &chat_id, &message);

    Ok((StatusCode::CREATED, Json(message)))
}
