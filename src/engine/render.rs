//! Render engine trait and error types.
//!
//! The engine is a black box to the session layer: it renders one page,
//! accepts navigation and input, and produces PNG screenshots. Each room
//! owns exactly one engine instance for its whole lifetime.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// URL a freshly spawned engine reports before any navigation.
pub const BLANK_URL: &str = "about:blank";

/// Errors produced by render engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has been closed; every subsequent operation fails fast.
    #[error("render engine is closed")]
    Closed,

    /// Navigation failed (network error, bad URL, renderer crash).
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// An input action failed. Treated as transient by callers.
    #[error("action failed: {0}")]
    Action(String),

    /// The operation exceeded its configured deadline.
    #[error("engine operation timed out")]
    Timeout,
}

/// Interface to one browser-like rendering surface.
///
/// Implementations must be safe to share behind an `Arc`; the session layer
/// guarantees that mutating calls are serialized per room, but read-only
/// calls (`current_url`, `screenshot_png`) may race with nothing more than
/// each other.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Navigates the page to `url` and waits for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;

    /// Clicks at the given viewport-relative fractional coordinates.
    ///
    /// Both values are expected in `[0, 1]`; implementations map them onto
    /// the configured viewport.
    async fn click(&self, x_fraction: f64, y_fraction: f64) -> Result<(), EngineError>;

    /// Scrolls the page by the given signed pixel deltas.
    async fn scroll_by(&self, dx: i32, dy: i32) -> Result<(), EngineError>;

    /// Presses a single named key (e.g. `"Enter"`, `"ArrowDown"`).
    async fn press_key(&self, key: &str) -> Result<(), EngineError>;

    /// Captures the current page as PNG bytes.
    async fn screenshot_png(&self) -> Result<Vec<u8>, EngineError>;

    /// Returns the URL the page currently shows.
    async fn current_url(&self) -> Result<String, EngineError>;

    /// Tears down the engine, releasing external resources.
    ///
    /// Idempotent: returns `true` only for the call that actually performed
    /// the close, `false` if the engine was already closed.
    async fn close(&self) -> Result<bool, EngineError>;
}

/// Factory seam for creating one engine per room.
#[async_trait]
pub trait EngineSpawner: Send + Sync {
    /// Spawns a fresh engine with the given viewport size in pixels.
    async fn spawn(&self, viewport: (u32, u32)) -> Result<Arc<dyn RenderEngine>, EngineError>;
}
