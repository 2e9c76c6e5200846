//! HTTP routes and handlers.
//!
//! The interesting traffic flows over the WebSocket; the REST side is a
//! small read-only observability surface.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::server::AppState;
use crate::api::websocket::ws_handler;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rooms: usize,
    pub connections: usize,
}

/// Per-room listing entry
#[derive(Debug, Serialize)]
pub struct RoomInfo {
    pub id: String,
    pub leader: String,
    pub members: usize,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// List rooms response
#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomInfo>,
}

/// Creates the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms", get(list_rooms))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rooms: state.coordinator.registry().len().await,
        connections: state.coordinator.broadcaster().connected_count().await,
    };
    Json(ApiResponse::success(response))
}

/// GET /rooms
async fn list_rooms(State(state): State<AppState>) -> impl IntoResponse {
    let mut rooms = Vec::new();
    for room in state.coordinator.registry().rooms().await {
        rooms.push(RoomInfo {
            id: room.id.clone(),
            leader: room.leader().to_string(),
            members: room.member_count().await,
            url: room.engine.current_url().await.ok(),
            created_at: room.created_at,
        });
    }
    rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Json(ApiResponse::success(RoomsResponse { rooms }))
}
