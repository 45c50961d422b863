use axum::{middleware, Router};

use crate::auth::middleware::JwtSecret;
use crate::auth::routes as auth_routes;
use crate::chat::routes as chat_routes;
use crate::matching::routes as matching_routes;
use crate::state::AppState;
use crate::survey::routes as survey_routes;
use crate::users::routes as user_routes;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let auth = Router::new()
        .route("/api/auth/register", axum::routing::post(auth_routes::register))
        .route("/api/auth/login", axum::routing::post(auth_routes::login));

    // Authenticated routes (JWT required — Claims extractor validates token)
    let users = Router::new()
        .route("/api/users/me", axum::routing::get(user_routes::get_me))
        .route("/api/users/me", axum::routing::patch(user_routes::update_me));

    let survey = Router::new()
        .route(
            "/api/survey/interests",
            axum::routing::get(survey_routes::list_interests),
        )
        .route(
            "/api/survey/me/interests",
            axum::routing::get(survey_routes::my_interests),
        )
        .route(
            "/api/survey/me/interests",
            axum::routing::put(survey_routes::replace_my_interests),
        );

    let recommendations = Router::new()
        .route(
            "/api/recommendations",
            axum::routing::get(matching_routes::get_recommendations),
        )
        .route(
            "/api/recommendations/{target_id}/hide",
            axum::routing::post(matching_routes::hide_user),
        );

    // Note: /api/chats/{user_id} resolves a chat with that USER, while the
    // deeper /api/chats/{chat_id}/messages routes key on the CHAT id.
    let chats = Router::new()
        .route("/api/chats", axum::routing::get(chat_routes::list_chats))
        .route(
            "/api/chats/{user_id}",
            axum::routing::get(chat_routes::get_or_create_chat),
        )
        .route(
            "/api/chats/{chat_id}/messages",
            axum::routing::get(chat_routes::list_messages),
        )
        .route(
            "/api/chats/{chat_id}/messages",
            axum::routing::post(chat_routes::send_message),
        );

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws = Router::new().route(
        "/ws/chats/{chat_id}",
        axum::routing::get(ws_handler::ws_upgrade),
    );

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth)
        .merge(users)
        .merge(survey)
        .merge(recommendations)
        .merge(chats)
        .merge(ws)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
