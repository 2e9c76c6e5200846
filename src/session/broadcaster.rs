//! Fan-out of state updates to room members.
//!
//! Delivery is best-effort and fire-and-forget: each participant has one
//! bounded outbound channel, and a send that fails (slow or disconnected
//! peer) is logged and skipped, never retried.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::session::room::{ParticipantId, Room};

/// Messages delivered to participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The requested room was created and the requester is its leader.
    RoomCreated { room_id: String },

    /// The requester joined an existing room as a follower.
    RoomJoined { room_id: String },

    /// A full page navigation happened; clients reload their view.
    Navigation { url: String, screenshot: String },

    /// The page changed in place (click, scroll, keypress).
    Update { screenshot: String, url: String },

    /// A request by this participant failed.
    Error { message: String },
}

/// Encodes raw PNG bytes as the inline payload clients render directly.
pub fn encode_screenshot(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Routes [`ServerMessage`]s to participant connections.
#[derive(Default)]
pub struct Broadcaster {
    senders: RwLock<HashMap<ParticipantId, mpsc::Sender<ServerMessage>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a participant's outbound channel. Called once per
    /// connection, before the participant can join any room.
    pub async fn register(&self, participant: ParticipantId, tx: mpsc::Sender<ServerMessage>) {
        self.senders.write().await.insert(participant, tx);
    }

    /// Drops a participant's channel on disconnect.
    pub async fn unregister(&self, participant: ParticipantId) {
        self.senders.write().await.remove(&participant);
    }

    pub async fn connected_count(&self) -> usize {
        self.senders.read().await.len()
    }

    /// Delivers a navigation event to every current member of the room.
    pub async fn broadcast_navigation(&self, room: &Room, url: String, screenshot: String) {
        self.broadcast(room, ServerMessage::Navigation { url, screenshot })
            .await;
    }

    /// Delivers an in-place update to every current member of the room.
    pub async fn broadcast_update(&self, room: &Room, url: String, screenshot: String) {
        self.broadcast(room, ServerMessage::Update { screenshot, url })
            .await;
    }

    async fn broadcast(&self, room: &Room, message: ServerMessage) {
        let members = room.members().await;
        let senders = self.senders.read().await;

        for member in members {
            let Some(tx) = senders.get(&member) else {
                debug!(room = %room.id, participant = %member, "member has no live connection");
                continue;
            };
            if let Err(e) = tx.try_send(message.clone()) {
                warn!(room = %room.id, participant = %member, error = %e, "dropping broadcast for participant");
            }
        }
    }

    /// Targeted delivery: permission errors, per-requester navigation
    /// failures, and late-joiner state sync.
    pub async fn notify_one(&self, participant: ParticipantId, message: ServerMessage) {
        let senders = self.senders.read().await;
        let Some(tx) = senders.get(&participant) else {
            debug!(participant = %participant, "notify target has no live connection");
            return;
        };
        if let Err(e) = tx.try_send(message) {
            warn!(participant = %participant, error = %e, "dropping message for participant");
        }
    }
}
