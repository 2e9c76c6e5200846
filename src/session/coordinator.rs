//! Per-connection session logic: permission checks, action serialization,
//! and broadcast triggering.
//!
//! Every mutating engine call goes through here. The coordinator turns each
//! room into a single-writer state machine by taking the room's action lock
//! around the engine call and the follow-up screenshot capture; concurrent
//! requests queue at the lock rather than being dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ServerSettings;
use crate::engine::{render::BLANK_URL, EngineError, EngineSpawner};
use crate::session::broadcaster::{encode_screenshot, Broadcaster, ServerMessage};
use crate::session::room::{ParticipantId, Room, RoomRegistry};
use crate::session::SessionError;

/// Keys forwarded to the engine. Anything else is dropped at the boundary.
const KEY_ALLOW_LIST: &[&str] = &[
    "Enter",
    "ArrowUp",
    "ArrowDown",
    "ArrowLeft",
    "ArrowRight",
    "Tab",
];

/// Leader-issued input actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", content = "data", rename_all = "kebab-case")]
pub enum BrowserAction {
    /// Click at viewport-relative fractional coordinates.
    Click { x: f64, y: f64 },
    /// Scroll by signed pixel deltas.
    Scroll { dx: i32, dy: i32 },
    /// Press a single named key.
    Keypress { key: String },
}

/// Binds participants to rooms and serializes everything they do there.
pub struct SessionCoordinator {
    registry: RoomRegistry,
    broadcaster: Arc<Broadcaster>,
    spawner: Arc<dyn EngineSpawner>,
    settings: ServerSettings,
}

impl SessionCoordinator {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        spawner: Arc<dyn EngineSpawner>,
        settings: ServerSettings,
    ) -> Self {
        Self {
            registry: RoomRegistry::new(),
            broadcaster,
            spawner,
            settings,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Creates a room and joins the creator as its leader.
    pub async fn create_room(
        &self,
        room_id: &str,
        identity: ParticipantId,
    ) -> Result<(), SessionError> {
        let viewport = (self.settings.viewport_width, self.settings.viewport_height);
        let engine = self
            .spawner
            .spawn(viewport)
            .await
            .map_err(|e| SessionError::EngineSpawnFailed(e.to_string()))?;

        match self.registry.create(room_id, identity, engine.clone()).await {
            Ok(room) => {
                room.add_member(identity).await;
                self.broadcaster
                    .notify_one(
                        identity,
                        ServerMessage::RoomCreated {
                            room_id: room_id.to_string(),
                        },
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                // Lost the creation race; release the engine we spawned.
                let _ = engine.close().await;
                Err(e)
            }
        }
    }

    /// Joins an existing room as a follower.
    ///
    /// If the room already shows a navigated page, the joiner alone
    /// immediately receives a `navigation` message with the current state.
    pub async fn join_room(
        &self,
        room_id: &str,
        identity: ParticipantId,
    ) -> Result<(), SessionError> {
        let room = self.registry.get(room_id).await?;
        room.add_member(identity).await;
        info!(room = %room_id, participant = %identity, "participant joined");

        self.broadcaster
            .notify_one(
                identity,
                ServerMessage::RoomJoined {
                    room_id: room_id.to_string(),
                },
            )
            .await;

        match room.engine.current_url().await {
            Ok(url) if url != BLANK_URL => {
                if let Ok(png) = room.engine.screenshot_png().await {
                    self.broadcaster
                        .notify_one(
                            identity,
                            ServerMessage::Navigation {
                                url,
                                screenshot: encode_screenshot(&png),
                            },
                        )
                        .await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                debug!(room = %room_id, error = %e, "skipping late-join state sync");
            }
        }

        Ok(())
    }

    /// Removes a participant from a room's membership.
    ///
    /// Never tears the engine down itself: an empty room is reclaimed
    /// asynchronously by the reaper, so an action still holding the lock
    /// can run to completion.
    pub async fn leave(&self, room_id: &str, identity: ParticipantId) {
        if let Ok(room) = self.registry.get(room_id).await {
            if room.remove_member(identity).await {
                info!(room = %room_id, participant = %identity, "participant left");
            }
        }
    }

    /// Leader-only page navigation; broadcasts the result to the room.
    pub async fn navigate(
        &self,
        room_id: &str,
        identity: ParticipantId,
        url: &str,
    ) -> Result<(), SessionError> {
        let room = self.registry.get(room_id).await?;
        if !room.is_leader(identity) {
            return Err(SessionError::Forbidden);
        }

        let url = normalize_url(url);
        let deadline = Duration::from_millis(self.settings.navigation_timeout_ms);

        let _guard = room.action_lock.lock().await;

        match timeout(deadline, room.engine.navigate(&url)).await {
            Ok(Ok(())) => {}
            Ok(Err(EngineError::Closed)) => return Err(SessionError::EngineClosed),
            Ok(Err(e)) => return Err(SessionError::NavigationFailed(e.to_string())),
            Err(_) => return Err(SessionError::NavigationFailed("navigation timed out".into())),
        }

        let (url, screenshot) = self.capture(&room).await?;
        info!(room = %room_id, url = %url, "navigation complete");
        self.broadcaster
            .broadcast_navigation(&room, url, screenshot)
            .await;
        Ok(())
    }

    /// Leader-only input action; broadcasts an in-place update to the room.
    ///
    /// Engine failures here are expected to be transient (e.g. scroll on a
    /// page mid-transition): they are logged and surfaced to nobody, except
    /// `Closed` which the caller maps to a removed room.
    pub async fn apply_action(
        &self,
        room_id: &str,
        identity: ParticipantId,
        action: BrowserAction,
    ) -> Result<(), SessionError> {
        let room = self.registry.get(room_id).await?;
        if !room.is_leader(identity) {
            return Err(SessionError::Forbidden);
        }

        if let BrowserAction::Keypress { key } = &action {
            if !KEY_ALLOW_LIST.contains(&key.as_str()) {
                debug!(room = %room_id, key = %key, "dropping key outside allow-list");
                return Ok(());
            }
        }

        let _guard = room.action_lock.lock().await;

        let result = match &action {
            BrowserAction::Click { x, y } => {
                room.engine
                    .click(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
                    .await
            }
            BrowserAction::Scroll { dx, dy } => room.engine.scroll_by(*dx, *dy).await,
            BrowserAction::Keypress { key } => room.engine.press_key(key).await,
        };

        match result {
            Ok(()) => {}
            Err(EngineError::Closed) => return Err(SessionError::EngineClosed),
            Err(e) => {
                warn!(room = %room_id, error = %e, "browser action failed");
                return Ok(());
            }
        }

        let (url, screenshot) = self.capture(&room).await?;
        self.broadcaster
            .broadcast_update(&room, url, screenshot)
            .await;
        Ok(())
    }

    /// Captures current URL + screenshot. Called with the action lock held.
    async fn capture(&self, room: &Room) -> Result<(String, String), SessionError> {
        let url = match room.engine.current_url().await {
            Ok(url) => url,
            Err(EngineError::Closed) => return Err(SessionError::EngineClosed),
            Err(e) => return Err(SessionError::NavigationFailed(e.to_string())),
        };
        let png = match room.engine.screenshot_png().await {
            Ok(png) => png,
            Err(EngineError::Closed) => return Err(SessionError::EngineClosed),
            Err(e) => return Err(SessionError::NavigationFailed(e.to_string())),
        };
        Ok((url, encode_screenshot(&png)))
    }
}

/// Prefixes `https://` when the URL carries no scheme.
fn normalize_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn browser_action_wire_shape() {
        let action: BrowserAction =
            serde_json::from_str(r#"{"action":"click","data":{"x":0.5,"y":0.25}}"#).unwrap();
        assert_eq!(action, BrowserAction::Click { x: 0.5, y: 0.25 });

        let action: BrowserAction =
            serde_json::from_str(r#"{"action":"scroll","data":{"dx":0,"dy":-120}}"#).unwrap();
        assert_eq!(action, BrowserAction::Scroll { dx: 0, dy: -120 });

        let action: BrowserAction =
            serde_json::from_str(r#"{"action":"keypress","data":{"key":"Enter"}}"#).unwrap();
        assert_eq!(
            action,
            BrowserAction::Keypress {
                key: "Enter".into()
            }
        );
    }
}
