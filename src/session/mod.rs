//! Session coordination: rooms, permissions, broadcast, reclamation.
//!
//! This is the core of the crate. A [`Room`](room::Room) binds one render
//! engine to a leader and a set of observers; the
//! [`SessionCoordinator`](coordinator::SessionCoordinator) validates and
//! serializes everything participants ask for; the
//! [`Broadcaster`](broadcaster::Broadcaster) fans resulting state out to
//! room members; the [reaper](reaper) evicts rooms nobody is watching.

pub mod broadcaster;
pub mod coordinator;
pub mod reaper;
pub mod room;

pub use broadcaster::Broadcaster;
pub use coordinator::{BrowserAction, SessionCoordinator};
pub use reaper::run_reaper;
pub use room::{ParticipantId, Room, RoomRegistry};

use thiserror::Error;

/// Failures of room-scoped operations.
///
/// Every variant is isolated to the requesting participant's connection;
/// a failure in one room never affects another room.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Create was called with a room id that is already taken.
    #[error("room '{0}' already exists")]
    AlreadyExists(String),

    /// The referenced room does not exist.
    #[error("room '{0}' not found")]
    NotFound(String),

    /// A non-leader attempted a mutating action.
    #[error("only the room leader can control the session")]
    Forbidden,

    /// The render engine for a new room could not be spawned.
    #[error("failed to create room: {0}")]
    EngineSpawnFailed(String),

    /// Navigation failed or timed out; room state is unchanged.
    #[error("failed to navigate: {0}")]
    NavigationFailed(String),

    /// An input action failed. Logged, never surfaced to participants.
    #[error("action failed: {0}")]
    ActionFailed(String),

    /// The engine was torn down (e.g. by the reaper) mid-use.
    #[error("room engine is closed")]
    EngineClosed,
}
