// ABOUTME: Main library entry point for onair
// ABOUTME: Exports the relay server, playback pipeline and speaker client

//! # onair
//!
//! Single-speaker live audio relay. Any number of clients may connect over
//! WebSocket, one at a time is granted the floor, and its audio is resampled
//! to the output rate and played through the local audio device.
//!
//! - **Server**: speaker arbitration, rate negotiation and audio ingestion
//! - **Audio**: FFT resampler, lock-free playback buffer, cpal output
//! - **Protocol**: control messages and a speaker client
//!
//! ## Example: Running a Server
//!
//! ```no_run
//! use onair::audio::PlaybackBuffer;
//! use onair::server::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::new().bind_addr("0.0.0.0:2000".parse().unwrap());
//!     let (buffer, _reader) = PlaybackBuffer::channel();
//!
//!     RelayServer::new(config, buffer).run().await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

/// Resampling, playback buffering and device I/O
pub mod audio;
/// Control messages and the speaker client
pub mod protocol;
/// Relay server: registry, sessions and the WebSocket endpoint
pub mod server;

pub use audio::{PlaybackBuffer, PlaybackReader};
pub use protocol::client::SpeakerClient;
pub use protocol::messages::{ControlMessage, ServerReply};
pub use server::{RelayServer, ServerConfig};

/// Result type for onair operations
pub type Result<T> = std::result::Result<T, error::Error>;

/// Error types for onair
pub mod error {
    use thiserror::Error;

    /// Error types for onair operations
    #[derive(Error, Debug)]
    pub enum Error {
        /// WebSocket-related error
        #[error("WebSocket error: {0}")]
        WebSocket(String),

        /// Protocol violation or parsing error
        #[error("Protocol error: {0}")]
        Protocol(String),

        /// Connection-related error
        #[error("Connection error: {0}")]
        Connection(String),

        /// Audio device error
        #[error("Audio output error: {0}")]
        Output(String),

        /// Audio capture error
        #[error("Audio input error: {0}")]
        Input(String),
    }
}
