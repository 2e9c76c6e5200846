//! HTTP server implementation using axum
//!
//! Provides the main server with CORS support, graceful shutdown,
//! and tracing middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::routes::create_router;
use crate::config::ServerSettings;
use crate::session::SessionCoordinator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session coordination core.
    pub coordinator: Arc<SessionCoordinator>,
    /// Effective server settings.
    pub settings: ServerSettings,
}

impl AppState {
    pub fn new(coordinator: Arc<SessionCoordinator>, settings: ServerSettings) -> Self {
        Self {
            coordinator,
            settings,
        }
    }
}

/// HTTP/WebSocket server.
pub struct ApiServer {
    addr: SocketAddr,
    state: AppState,
    /// Address actually bound (differs from `addr` when port 0 was asked).
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<watch::Sender<bool>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            state,
            local_addr: None,
            shutdown_tx: None,
            server_handle: None,
        }
    }

    /// The address the server is actually listening on, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Configure CORS for browser clients.
    fn configure_cors() -> CorsLayer {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
            .max_age(Duration::from_secs(3600))
    }

    /// Build the router with all middleware.
    fn build_router(&self) -> Router {
        create_router(self.state.clone())
            .layer(Self::configure_cors())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.server_handle.is_some() {
            warn!("server is already running");
            return Ok(());
        }

        let router = self.build_router();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("server listening on http://{}", local_addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    while !*shutdown_rx.borrow() {
                        if shutdown_rx.changed().await.is_err() {
                            break;
                        }
                    }
                    info!("server shutting down gracefully");
                })
                .await
                .unwrap_or_else(|e| {
                    error!("server error: {}", e);
                });
        });

        self.server_handle = Some(handle);
        Ok(())
    }

    /// Stop the server gracefully.
    pub async fn stop(&mut self) {
        if self.server_handle.is_none() {
            warn!("server is not running");
            return;
        }

        info!("stopping server...");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }

        if let Some(handle) = self.server_handle.take() {
            tokio::select! {
                _ = handle => {
                    info!("server stopped");
                }
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    warn!("server shutdown timed out");
                }
            }
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        // Send shutdown signal if the server is still running.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngineSpawner;
    use crate::session::Broadcaster;

    fn test_state() -> AppState {
        let settings = ServerSettings::default();
        let coordinator = Arc::new(SessionCoordinator::new(
            Arc::new(Broadcaster::new()),
            Arc::new(MockEngineSpawner::new()),
            settings.clone(),
        ));
        AppState::new(coordinator, settings)
    }

    #[tokio::test]
    async fn server_binds_ephemeral_port() {
        let mut server = ApiServer::new(([127, 0, 0, 1], 0).into(), test_state());
        server.start().await.unwrap();

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        server.stop().await;
    }
}
