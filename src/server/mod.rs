// ABOUTME: Server module for the relay
// ABOUTME: Provides the WebSocket server, speaker arbitration and playback wiring

mod audio_engine;
mod cli;
mod client_handler;
mod config;
mod registry;
mod server;
mod session;

pub use audio_engine::{spawn_audio_engine, AudioEngine, EngineState};
pub use cli::{init_tracing, ServerArgs};
pub use client_handler::handle_client;
pub use config::ServerConfig;
pub use registry::{AdmissionPolicy, ConnectionId, Registration, SessionRegistry, SpeakerGrant};
pub use server::{AppState, RelayServer};
pub use session::{
    decode_pcm16, Session, SessionAction, SessionState, MAX_CHUNK_BYTES, MAX_CHUNK_SECONDS,
};
