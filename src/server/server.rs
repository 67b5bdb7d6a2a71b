// ABOUTME: Main relay server implementation
// ABOUTME: Provides the WebSocket endpoint and wires sessions to the registry and buffer

use crate::audio::PlaybackBuffer;
use crate::server::client_handler::handle_client;
use crate::server::config::ServerConfig;
use crate::server::registry::SessionRegistry;
use crate::server::session::MAX_CHUNK_BYTES;
use axum::{
    extract::ws::WebSocketUpgrade,
    extract::State,
    response::IntoResponse,
    routing::any,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Speaker arbitration
    pub registry: Arc<SessionRegistry>,
    /// Playback handoff to the audio callback
    pub buffer: Arc<PlaybackBuffer>,
}

/// Relay server
pub struct RelayServer {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Speaker arbitration
    registry: Arc<SessionRegistry>,
    /// Producer side of the playback buffer
    buffer: Arc<PlaybackBuffer>,
}

impl RelayServer {
    /// Create a relay server feeding `buffer`.
    ///
    /// The matching [`crate::audio::PlaybackReader`] belongs to whatever
    /// drives the output device.
    pub fn new(config: ServerConfig, buffer: Arc<PlaybackBuffer>) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.admission));
        Self {
            config: Arc::new(config),
            registry,
            buffer,
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Get the playback buffer
    pub fn buffer(&self) -> Arc<PlaybackBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Build the axum router serving the WebSocket endpoint
    pub fn router(&self) -> Router {
        let state = AppState {
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            buffer: Arc::clone(&self.buffer),
        };

        Router::new()
            .route(&self.config.ws_path, any(ws_handler))
            .with_state(state)
    }

    /// Run the server until Ctrl-C
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        log::info!(
            "Relay server listening on {} (endpoint: {})",
            self.config.bind_addr,
            self.config.ws_path
        );

        let shutdown_signal = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => log::info!("Received shutdown signal"),
                Err(e) => {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        self.serve(listener, shutdown_signal).await?;

        log::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// WebSocket upgrade handler
///
/// Messages larger than the longest acceptable audio chunk end the
/// connection before they are buffered.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_CHUNK_BYTES).on_upgrade(move |socket| {
        handle_client(socket, state.registry, state.buffer, state.config)
    })
}
