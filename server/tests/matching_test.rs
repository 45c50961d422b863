//! Integration tests for the recommendation feed: scoring, exclusion of
//! self and passed targets, hide idempotency, and survey validation.

use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Helper: start the server on a random port and return (base_url, db handle).
async fn start_test_server() -> (String, kindred_server::db::DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = kindred_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = kindred_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");
    kindred_server::survey::seed::seed_interests(&db).expect("Failed to seed interests");

    let state = kindred_server::state::AppState {
        db: db.clone(),
        jwt_secret,
        connections: kindred_server::ws::new_chat_connections(),
    };

    let app = kindred_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), db)
}

/// Register a user and return (access_token, user_id).
async fn register_user(base_url: &str, email: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({ "email": email }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let token = resp.json::<Value>().await.unwrap()["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let me: Value = client
        .get(format!("{}/api/users/me", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_id = me["id"].as_str().unwrap().to_string();

    (token, user_id)
}

/// Select interests by catalog name for the given user.
async fn select_interests(base_url: &str, token: &str, names: &[&str]) {
    let client = reqwest::Client::new();
    let catalog: Value = client
        .get(format!("{}/api/survey/interests", base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let ids: Vec<String> = catalog
        .as_array()
        .unwrap()
        .iter()
        .filter(|i| names.contains(&i["name"].as_str().unwrap()))
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), names.len(), "every name must exist in the catalog");

    let resp = client
        .put(format!("{}/api/survey/me/interests", base_url))
        .bearer_auth(token)
        .json(&json!({ "interest_ids": ids }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

async fn recommendations(base_url: &str, token: &str) -> Vec<Value> {
    reqwest::Client::new()
        .get(format!("{}/api/recommendations", base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json::<Vec<Value>>()
        .await
        .unwrap()
}

#[tokio::test]
async fn scores_rank_and_exclude_zero_overlap() {
    let (base_url, _db) = start_test_server().await;

    let (me_token, me_id) = register_user(&base_url, "me@example.com").await;
    let (partial_token, partial_id) = register_user(&base_url, "partial@example.com").await;
    let (perfect_token, perfect_id) = register_user(&base_url, "perfect@example.com").await;
    let (disjoint_token, _) = register_user(&base_url, "disjoint@example.com").await;

    // me: {Sport, Music}; partial: {Sport, Travel} -> 1/3 = 33;
    // perfect: {Sport, Music} -> 100; disjoint: {Books} -> 0, excluded.
    select_interests(&base_url, &me_token, &["Sport", "Music"]).await;
    select_interests(&base_url, &partial_token, &["Sport", "Travel"]).await;
    select_interests(&base_url, &perfect_token, &["Sport", "Music"]).await;
    select_interests(&base_url, &disjoint_token, &["Books"]).await;

    let recs = recommendations(&base_url, &me_token).await;
    let ids: Vec<&str> = recs.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![perfect_id.as_str(), partial_id.as_str()]);
    assert_eq!(recs[0]["compatibility"], 100);
    assert_eq!(recs[1]["compatibility"], 33);

    // Never includes the requester
    assert!(!ids.contains(&me_id.as_str()));
}

#[tokio::test]
async fn hide_removes_target_and_is_idempotent() {
    let (base_url, db) = start_test_server().await;

    let (me_token, me_id) = register_user(&base_url, "me@example.com").await;
    let (other_token, other_id) = register_user(&base_url, "other@example.com").await;
    select_interests(&base_url, &me_token, &["Sport"]).await;
    select_interests(&base_url, &other_token, &["Sport"]).await;

    assert_eq!(recommendations(&base_url, &me_token).await.len(), 1);

    let client = reqwest::Client::new();
    for _ in 0..2 {
        let resp = client
            .post(format!("{}/api/recommendations/{}/hide", base_url, other_id))
            .bearer_auth(&me_token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);
    }

    // Exactly one pass row despite the repeated hide
    let passes: i64 = {
        let conn = db.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM interactions
             WHERE actor_id = ?1 AND target_id = ?2 AND kind = 'pass'",
            rusqlite::params![me_id, other_id],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(passes, 1);

    // The passed target no longer appears; the pass is one-directional
    assert!(recommendations(&base_url, &me_token).await.is_empty());
    assert_eq!(recommendations(&base_url, &other_token).await.len(), 1);
}

#[tokio::test]
async fn hiding_an_unknown_target_is_not_found() {
    let (base_url, _db) = start_test_server().await;
    let (token, _) = register_user(&base_url, "me@example.com").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/recommendations/no-such-user/hide", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn empty_interest_selection_is_rejected() {
    let (base_url, _db) = start_test_server().await;
    let (token, _) = register_user(&base_url, "me@example.com").await;

    let resp = reqwest::Client::new()
        .put(format!("{}/api/survey/me/interests", base_url))
        .bearer_auth(&token)
        .json(&json!({ "interest_ids": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn user_without_interests_gets_no_recommendations() {
    let (base_url, _db) = start_test_server().await;

    let (me_token, _) = register_user(&base_url, "me@example.com").await;
    let (other_token, _) = register_user(&base_url, "other@example.com").await;
    select_interests(&base_url, &other_token, &["Music"]).await;

    // My set is empty: every candidate scores 0 and is excluded
    assert!(recommendations(&base_url, &me_token).await.is_empty());
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let (base_url, _db) = start_test_server().await;

    let resp = reqwest::Client::new()
        .get(format!("{}/api/recommendations", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
