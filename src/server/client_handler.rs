// ABOUTME: WebSocket client handler
// ABOUTME: Handles individual connections: admission, message routing and teardown

use crate::audio::PlaybackBuffer;
use crate::protocol::messages::ServerReply;
use crate::server::config::ServerConfig;
use crate::server::registry::SessionRegistry;
use crate::server::session::{Session, SessionAction};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

/// Handle a WebSocket client connection
pub async fn handle_client(
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
    buffer: Arc<PlaybackBuffer>,
    config: Arc<ServerConfig>,
) {
    let id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let registration = match registry.admit(id) {
        Some(registration) => registration,
        None => {
            reject(&mut ws_tx).await;
            return;
        }
    };

    // From here on the registration is released however the task ends
    let mut session = Session::new(registration, buffer, config.output_rate);

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => match session.on_text(text.as_str()) {
                SessionAction::None => {}
                SessionAction::Reply(reply) => {
                    if send_reply(&mut ws_tx, reply).await.is_err() {
                        log::debug!("Client {} disconnected (send failed)", id);
                        break;
                    }
                }
                SessionAction::Close(reply) => {
                    reject_with(&mut ws_tx, reply).await;
                    break;
                }
            },
            Ok(WsMessage::Binary(data)) => {
                session.on_binary(&data);
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                // Handled automatically by axum
            }
            Ok(WsMessage::Close(_)) => {
                log::info!("Client {} closed connection", id);
                break;
            }
            Err(e) => {
                log::warn!("WebSocket error for client {}: {}", id, e);
                break;
            }
        }
    }

    session.close();
    log::info!("Client {} disconnected", id);
}

type WsSink = SplitSink<WebSocket, WsMessage>;

async fn send_reply(ws_tx: &mut WsSink, reply: ServerReply) -> Result<(), axum::Error> {
    ws_tx.send(WsMessage::Text(reply.as_str().into())).await
}

/// Turn a connection away at the handshake
async fn reject(ws_tx: &mut WsSink) {
    reject_with(ws_tx, ServerReply::Rejected).await;
}

/// Send the final reply, then close the socket
async fn reject_with(ws_tx: &mut WsSink, reply: ServerReply) {
    if send_reply(ws_tx, reply).await.is_err() {
        return;
    }
    let _ = ws_tx.send(WsMessage::Close(None)).await;
}
