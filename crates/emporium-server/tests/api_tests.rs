//! Integration tests for the command server.
//!
//! HTTP routes are driven through `tower::ServiceExt::oneshot` without a
//! TCP listener. Command flows go through [`AppState::handle_text`], the
//! same entry point the `WebSocket` loop uses.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use emporium_game::{Catalog, Clock, Game, GameSettings, SystemClock};
use emporium_server::{AccessPolicy, AppState, build_router};
use emporium_store::DocumentStore;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

fn make_state(password: &str) -> Arc<AppState> {
    let game = Game::new(
        Arc::new(DocumentStore::in_memory()),
        Arc::new(Catalog::sample().unwrap()),
        Arc::new(SystemClock) as Arc<dyn Clock>,
        GameSettings {
            event_chance_percent: 0,
            seed: Some(9),
        },
    );
    AppState::new(
        game,
        AccessPolicy {
            update_password: password.to_owned(),
            admin_ids: std::collections::BTreeSet::new(),
        },
    )
    .shared()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(state: &AppState, frame: Value) -> Value {
    state
        .handle_text("tester", &frame.to_string())
        .await
        .reply
        .expect("request_id frames always get a reply")
}

#[tokio::test]
async fn status_reports_counts() {
    let state = make_state("pw");
    call(&state, json!({"type": "create-session", "password": "pw", "request_id": "1"})).await;

    let app = build_router(Arc::clone(&state));
    let response = app
        .oneshot(Request::builder().uri("/ws/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["connected"], 0);
    assert_eq!(json["sessions"], 1);
    assert!(
        json["message_types"]
            .as_array()
            .unwrap()
            .contains(&json!("create-exchange-offer"))
    );
}

#[tokio::test]
async fn connect_without_upgrade_is_rejected() {
    let app = build_router(make_state("pw"));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/ws/connect?client_id=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_router(make_state("pw"));
    let response = app
        .oneshot(Request::builder().uri("/api/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lobby_flow_over_commands() {
    let state = make_state("pw");
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.hub.register("watcher", tx).await;

    let session = call(
        &state,
        json!({"type": "create-session", "password": "pw", "request_id": "s"}),
    )
    .await;
    let session_id = session["data"]["session_id"].as_str().unwrap().to_owned();

    let staged = call(
        &state,
        json!({
            "type": "update-session-stage", "password": "pw", "request_id": "st",
            "session_id": session_id, "stage": "FreeUserConnect",
        }),
    )
    .await;
    assert_eq!(staged["data"]["stage"], "FreeUserConnect");

    let user = call(
        &state,
        json!({
            "type": "create-user", "password": "pw", "request_id": "u",
            "session_id": session_id, "user_id": 42, "username": "alice",
        }),
    )
    .await;
    assert_eq!(user["type"], "response");

    let company = call(
        &state,
        json!({
            "type": "create-company", "password": "pw", "request_id": "c",
            "session_id": session_id, "name": "Acme", "who_create": 42,
        }),
    )
    .await;
    assert_eq!(company["data"]["name"], "Acme");
    assert_eq!(company["data"]["balance"], 5000);

    let listed = call(
        &state,
        json!({"type": "get-companies", "request_id": "l", "session_id": session_id}),
    )
    .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let mut names = Vec::new();
    while let Ok(text) = rx.try_recv() {
        let frame: Value = serde_json::from_str(&text).unwrap();
        names.push(frame["type"].as_str().unwrap().to_owned());
    }
    assert_eq!(names.first().map(String::as_str), Some("api-create_session"));
    assert!(names.iter().any(|n| n == "api-create_user"));
    assert!(names.iter().any(|n| n == "api-create_company"));
    assert!(names.iter().all(|n| n.starts_with("api-")));
}

#[tokio::test]
async fn mutations_without_password_are_refused() {
    let state = make_state("pw");
    let reply = call(&state, json!({"type": "create-session", "request_id": "x"})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["kind"], "auth");
    assert_eq!(state.session_count().await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_a_session_needs_confirmation() {
    let state = make_state("pw");
    let session = call(
        &state,
        json!({"type": "create-session", "password": "pw", "request_id": "s"}),
    )
    .await;
    let id = session["data"]["session_id"].clone();

    let refused = call(
        &state,
        json!({"type": "delete-session", "password": "pw", "request_id": "d", "session_id": id}),
    )
    .await;
    assert_eq!(refused["kind"], "validation");

    let deleted = call(
        &state,
        json!({
            "type": "delete-session", "password": "pw", "request_id": "d",
            "session_id": id, "really": true,
        }),
    )
    .await;
    assert_eq!(deleted["data"]["deleted"], true);
    assert_eq!(state.session_count().await.unwrap(), 0);
}
