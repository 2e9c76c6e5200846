//! Room data model and process-wide room registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::RenderEngine;
use crate::session::SessionError;

/// Connection-scoped participant identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named shared browsing session: one engine, one leader, many observers.
pub struct Room {
    /// Caller-supplied identifier, unique across the registry.
    pub id: String,

    /// The participant that created the room. Immutable; leadership is
    /// never transferred.
    leader: ParticipantId,

    /// The rendering surface this room exclusively owns.
    pub engine: Arc<dyn RenderEngine>,

    /// Currently joined participants.
    members: RwLock<HashSet<ParticipantId>>,

    /// Serializes mutating engine operations. At most one in-flight action
    /// per room; the reaper also takes this before closing the engine.
    pub action_lock: Mutex<()>,

    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: String, leader: ParticipantId, engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            id,
            leader,
            engine,
            members: RwLock::new(HashSet::new()),
            action_lock: Mutex::new(()),
            created_at: Utc::now(),
        }
    }

    /// Leadership is a pure function of identity, never a stored flag.
    pub fn is_leader(&self, participant: ParticipantId) -> bool {
        self.leader == participant
    }

    pub fn leader(&self) -> ParticipantId {
        self.leader
    }

    pub async fn add_member(&self, participant: ParticipantId) {
        self.members.write().await.insert(participant);
    }

    /// Removes a member; returns `true` if it was present.
    pub async fn remove_member(&self, participant: ParticipantId) -> bool {
        self.members.write().await.remove(&participant)
    }

    pub async fn members(&self) -> Vec<ParticipantId> {
        self.members.read().await.iter().copied().collect()
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("leader", &self.leader)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Process-wide mapping from room id to room.
///
/// All state is in-memory and process-lifetime-scoped: the registry starts
/// empty and is torn down with [`RoomRegistry::close_all`] at shutdown.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically checks-and-inserts a new room.
    ///
    /// The engine must already be spawned by the caller; on
    /// `AlreadyExists` the caller is responsible for closing it.
    pub async fn create(
        &self,
        id: &str,
        leader: ParticipantId,
        engine: Arc<dyn RenderEngine>,
    ) -> Result<Arc<Room>, SessionError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(id) {
            return Err(SessionError::AlreadyExists(id.to_string()));
        }

        let room = Arc::new(Room::new(id.to_string(), leader, engine));
        rooms.insert(id.to_string(), room.clone());
        info!(room = %id, leader = %leader, "room created");
        Ok(room)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<Room>, SessionError> {
        self.rooms
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Removes the mapping. The caller must already have closed (or be
    /// about to close) the room's engine.
    pub async fn remove(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.write().await.remove(id)
    }

    /// Puts a removed room back, unless its id has since been reused.
    pub(crate) async fn reinstate(&self, room: Arc<Room>) {
        self.rooms
            .write()
            .await
            .entry(room.id.clone())
            .or_insert(room);
    }

    pub async fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Shutdown teardown: closes every engine and clears the map.
    pub async fn close_all(&self) {
        let rooms: Vec<Arc<Room>> = self.rooms.write().await.drain().map(|(_, r)| r).collect();
        for room in rooms {
            let _guard = room.action_lock.lock().await;
            if let Err(e) = room.engine.close().await {
                warn!(room = %room.id, error = %e, "failed to close engine during shutdown");
            }
        }
    }
}
