//! Router-level tests for the REST endpoints using tower's oneshot utility.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use cobrowse::{
    api::{create_router, AppState},
    Broadcaster, MockEngineSpawner, ParticipantId, ServerSettings, SessionCoordinator,
};

fn test_state() -> AppState {
    let settings = ServerSettings::default();
    let coordinator = Arc::new(SessionCoordinator::new(
        Arc::new(Broadcaster::new()),
        Arc::new(MockEngineSpawner::new()),
        settings.clone(),
    ));
    AppState::new(coordinator, settings)
}

async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
    let router = create_router(state);
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_ok_and_version() {
    let (status, body) = get_json(test_state(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["data"]["rooms"], 0);
}

#[tokio::test]
async fn rooms_listing_reflects_registry() {
    let state = test_state();

    let leader = ParticipantId::new();
    state.coordinator.create_room("abc", leader).await.unwrap();
    state
        .coordinator
        .navigate("abc", leader, "example.com")
        .await
        .unwrap();

    let (status, body) = get_json(state, "/rooms").await;

    assert_eq!(status, StatusCode::OK);
    let rooms = body["data"]["rooms"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], "abc");
    assert_eq!(rooms[0]["members"], 1);
    assert_eq!(rooms[0]["url"], "https://example.com/");
    assert_eq!(rooms[0]["leader"], leader.to_string());
}

#[tokio::test]
async fn unknown_route_is_404() {
    let router = create_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .uri("/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
