//! Network surface: HTTP endpoints and the participant WebSocket.

pub mod routes;
pub mod server;
pub mod websocket;

pub use routes::create_router;
pub use server::{ApiServer, AppState};
pub use websocket::ClientMessage;
