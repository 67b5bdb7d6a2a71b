// ABOUTME: WebSocket client for the speaker side of the relay
// ABOUTME: Requests the floor, announces its sample rate and streams PCM chunks

use crate::error::Error;
use crate::protocol::messages::{ControlMessage, RateInfo, ServerReply};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection to a relay server
pub struct SpeakerClient {
    ws: WsStream,
}

impl SpeakerClient {
    /// Connect to a relay server, e.g. `ws://localhost:2000`
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| Error::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        log::debug!("Connected to {}", url);
        Ok(Self { ws })
    }

    /// Ask for the floor and wait for the server's answer
    pub async fn request_speaker(&mut self) -> Result<ServerReply, Error> {
        self.send_control(&ControlMessage::Request).await?;
        self.next_reply()
            .await?
            .ok_or_else(|| Error::Connection("Connection closed before reply".to_string()))
    }

    /// Declare the sample rate of the audio that follows
    pub async fn announce_rate(&mut self, rate: u32) -> Result<(), Error> {
        self.send_control(&ControlMessage::RateInfo(RateInfo { rate })).await
    }

    /// Send an arbitrary text frame
    pub async fn send_text(&mut self, text: &str) -> Result<(), Error> {
        self.ws
            .send(WsMessage::Text(text.to_string()))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    /// Send mono samples as one little-endian binary frame
    pub async fn send_audio(&mut self, samples: &[i16]) -> Result<(), Error> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.ws
            .send(WsMessage::Binary(bytes))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    /// Wait for the next reply from the server.
    ///
    /// Returns `None` once the server has closed the connection.
    pub async fn next_reply(&mut self) -> Result<Option<ServerReply>, Error> {
        while let Some(msg) = self.ws.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => match ServerReply::parse(&text) {
                    Some(reply) => return Ok(Some(reply)),
                    None => log::debug!("Ignoring unexpected text from server: {}", text),
                },
                Ok(WsMessage::Close(_)) => return Ok(None),
                Ok(_) => continue,
                Err(e) => return Err(Error::WebSocket(e.to_string())),
            }
        }
        Ok(None)
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<(), Error> {
        self.ws
            .close(None)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn send_control(&mut self, msg: &ControlMessage) -> Result<(), Error> {
        let text = msg.to_text()?;
        self.send_text(&text).await
    }
}
