//! # Cobrowse
//!
//! A collaborative browsing server. Many remote participants observe one
//! shared server-rendered browsing session streamed as images; the single
//! participant that created a room (its leader) drives navigation and input.
//!
//! ## Module Overview
//!
//! - [`engine`]: Render engine trait, errors, and the mock implementation
//! - [`session`]: Rooms, registry, coordinator, broadcaster, reaper
//! - [`api`]: HTTP server and the participant WebSocket protocol
//! - [`config`]: Configuration loading and management
//!
//! ## Architecture
//!
//! ```text
//! participant message
//!     -> SessionCoordinator (room lookup + leader check)
//!     -> Room action lock (one in-flight action per room)
//!     -> RenderEngine (navigate / click / scroll / keypress)
//!     -> Broadcaster (navigation/update fan-out to room members)
//! ```
//!
//! Rooms with zero members are closed and evicted by a periodic reaper
//! sweep; the reaper waits on the room's action lock before closing the
//! engine, so in-flight actions always run to completion.

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// HTTP server and the participant WebSocket protocol.
pub mod api;

/// Configuration management for loading settings from files, env, and CLI.
pub mod config;

/// Render engine abstraction and mock implementation.
pub mod engine;

/// Session coordination core: rooms, permissions, broadcast, reclamation.
pub mod session;

// Re-exports for convenience
pub use api::{ApiServer, AppState, ClientMessage};
pub use config::{CliArgs, ConfigError, ServerSettings};
pub use engine::{EngineError, EngineSpawner, MockEngineSpawner, MockRenderEngine, RenderEngine};
pub use session::{
    broadcaster::ServerMessage, BrowserAction, Broadcaster, ParticipantId, Room, RoomRegistry,
    SessionCoordinator, SessionError,
};
