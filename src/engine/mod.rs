//! Render engine abstraction.
//!
//! Rooms drive a browser-like rendering surface through the [`RenderEngine`]
//! trait. Real deployments plug in an adapter over an external headless
//! browser; the crate ships [`MockRenderEngine`] for tests and for running
//! the server without a browser attached.
//!
//! # Submodules
//!
//! - [`render`] - The `RenderEngine` trait, engine errors, and the spawner seam
//! - [`mock`] - Deterministic in-process engine implementation

pub mod mock;
pub mod render;

pub use mock::{MockEngineSpawner, MockRenderEngine};
pub use render::{EngineError, EngineSpawner, RenderEngine};
