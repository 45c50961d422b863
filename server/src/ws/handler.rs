use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::chat::registry;
use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
/// Auth is via query param ?token=JWT — browsers cannot set headers on
/// WebSocket upgrades.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// Application WebSocket close codes:
/// 4001 = token expired
/// 4002 = token invalid
/// 4003 = not a participant of the chat (or chat missing)
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;
const CLOSE_NOT_PARTICIPANT: u16 = 4003;

/// GET /ws/chats/{chat_id}?token=JWT
/// Live-connection endpoint for one chat. The caller must be a participant;
/// this is verified before the connection is registered. On auth or access
/// failure the connection upgrades and then immediately closes with an
/// application close code, so clients can tell the cases apart.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = match jwt::validate_access_token(&state.jwt_secret, &params.token) {
        Ok(claims) => claims,
        Err(err) => {
            let (close_code, reason) = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    (CLOSE_TOKEN_EXPIRED, "Token expired")
                }
                _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
            };
            tracing::warn!(close_code, reason, "WebSocket auth failed");
            return ws.on_upgrade(move |socket| close_with(socket, close_code, reason));
        }
    };

    let user_id = claims.sub;

    // Participant check against the store before any registration happens
    let is_participant = {
        let db = state.db.clone();
        let chat = chat_id.clone();
        let user = user_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().ok()?;
            let chat = registry::get_chat_by_id(&conn, &chat).ok()??;
            Some(chat.has_participant(&user))
        })
        .await
        .ok()
        .flatten()
        .unwrap_or(false)
    };

    if !is_participant {
        tracing::warn!(
            chat_id = %chat_id,
            user_id = %user_id,
            "WebSocket rejected: not a chat participant"
        );
        return ws.on_upgrade(move |socket| {
            close_with(socket, CLOSE_NOT_PARTICIPANT, "Not a chat participant")
        });
    }

    tracing::info!(chat_id = %chat_id, user_id = %user_id, "WebSocket connection authenticated");
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, chat_id, user_id))
}

/// Upgrade the connection, then immediately close with the error code.
async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let close_frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = socket.send(Message::Close(Some(close_frame))).await;
}
