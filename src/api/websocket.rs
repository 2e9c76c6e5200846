//! Participant WebSocket handling.
//!
//! Each connection gets a fresh [`ParticipantId`], an outbound channel
//! registered with the broadcaster, and at most one joined room at a time.
//! Disconnecting is an implicit leave; an action already holding a room's
//! lock runs to completion regardless.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::api::server::AppState;
use crate::session::broadcaster::ServerMessage;
use crate::session::coordinator::BrowserAction;
use crate::session::room::ParticipantId;
use crate::session::SessionError;

/// Outbound channel depth per participant. A participant that cannot drain
/// screenshots this far behind starts losing frames (best-effort delivery).
const OUTBOUND_BUFFER: usize = 64;

/// Messages participants send to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a room and become its leader.
    CreateRoom { room_id: String },

    /// Join an existing room as a follower.
    JoinRoom { room_id: String },

    /// Leader-only: navigate the shared page.
    Navigate { room_id: String, url: String },

    /// Leader-only: input action against the shared page.
    BrowserAction {
        room_id: String,
        #[serde(flatten)]
        action: BrowserAction,
    },
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an individual participant connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let participant = ParticipantId::new();
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);
    state
        .coordinator
        .broadcaster()
        .register(participant, tx)
        .await;
    info!(participant = %participant, "participant connected");

    // Task forwarding session messages out to the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to serialize outbound message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Shared so the cleanup below sees the joined room even when the send
    // side is what tore the connection down.
    let joined_room = Arc::new(Mutex::new(None::<String>));

    let coordinator = state.coordinator.clone();
    let recv_room = joined_room.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            debug!(participant = %participant, error = %e, "unparseable message");
                            continue;
                        }
                    };
                    handle_message(&coordinator, participant, client_msg, &recv_room).await;
                }
                Message::Close(_) => break,
                // Protocol pings are answered by axum; binary is unused.
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears the other down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Some(room_id) = joined_room.lock().await.take() {
        state.coordinator.leave(&room_id, participant).await;
    }
    state
        .coordinator
        .broadcaster()
        .unregister(participant)
        .await;
    info!(participant = %participant, "participant disconnected");
}

/// Dispatches one inbound message, reporting failures to the requester only.
async fn handle_message(
    coordinator: &crate::session::SessionCoordinator,
    participant: ParticipantId,
    message: ClientMessage,
    joined_room: &Mutex<Option<String>>,
) {
    let broadcaster = coordinator.broadcaster().clone();

    match message {
        ClientMessage::CreateRoom { room_id } => {
            // The coordinator notifies the creator on success.
            match coordinator.create_room(&room_id, participant).await {
                Ok(()) => switch_room(coordinator, participant, joined_room, &room_id).await,
                Err(e) => {
                    broadcaster
                        .notify_one(
                            participant,
                            ServerMessage::Error {
                                message: e.to_string(),
                            },
                        )
                        .await;
                }
            }
        }
        ClientMessage::JoinRoom { room_id } => {
            // The coordinator notifies the joiner (and syncs state) on success.
            match coordinator.join_room(&room_id, participant).await {
                Ok(()) => switch_room(coordinator, participant, joined_room, &room_id).await,
                Err(e) => {
                    broadcaster
                        .notify_one(
                            participant,
                            ServerMessage::Error {
                                message: e.to_string(),
                            },
                        )
                        .await;
                }
            }
        }
        ClientMessage::Navigate { room_id, url } => {
            if let Err(e) = coordinator.navigate(&room_id, participant, &url).await {
                broadcaster
                    .notify_one(
                        participant,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
        ClientMessage::BrowserAction { room_id, action } => {
            match coordinator.apply_action(&room_id, participant, action).await {
                Ok(()) => {}
                // Transient engine failures never reach participants, but
                // trying to drive a missing/foreign/closed room does.
                Err(
                    e @ (SessionError::Forbidden
                    | SessionError::NotFound(_)
                    | SessionError::EngineClosed),
                ) => {
                    broadcaster
                        .notify_one(
                            participant,
                            ServerMessage::Error {
                                message: e.to_string(),
                            },
                        )
                        .await;
                }
                Err(e) => {
                    debug!(participant = %participant, error = %e, "action not surfaced");
                }
            }
        }
    }
}

/// A connection holds at most one room; joining another leaves the first.
async fn switch_room(
    coordinator: &crate::session::SessionCoordinator,
    participant: ParticipantId,
    joined_room: &Mutex<Option<String>>,
    new_room: &str,
) {
    let previous = joined_room.lock().await.replace(new_room.to_string());
    if let Some(previous) = previous {
        if previous != new_room {
            coordinator.leave(&previous, participant).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_room_wire_shape() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"create-room","data":{"roomId":"abc"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom {
                room_id: "abc".into()
            }
        );
    }

    #[test]
    fn navigate_wire_shape() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"navigate","data":{"roomId":"abc","url":"example.com"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Navigate {
                room_id: "abc".into(),
                url: "example.com".into()
            }
        );
    }

    #[test]
    fn browser_action_wire_shape_nests_action_payload() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"browser-action","data":{"roomId":"abc","action":"scroll","data":{"dx":0,"dy":240}}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::BrowserAction {
                room_id: "abc".into(),
                action: BrowserAction::Scroll { dx: 0, dy: 240 },
            }
        );

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"browser-action","data":{"roomId":"abc","action":"keypress","data":{"key":"Escape"}}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::BrowserAction { .. }));
    }
}
