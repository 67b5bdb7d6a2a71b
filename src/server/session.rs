// ABOUTME: Per-connection session state machine
// ABOUTME: Routes control messages to the registry and speaker audio into playback

use crate::audio::resampler::output_len;
use crate::audio::{PlaybackBuffer, Resampler};
use crate::protocol::messages::{ControlMessage, ServerReply, MAX_RATE};
use crate::server::registry::{ConnectionId, Registration, SpeakerGrant};
use std::sync::Arc;

/// Longest chunk accepted from a speaker, in seconds of audio
pub const MAX_CHUNK_SECONDS: usize = 2;

/// Largest binary frame a speaker may send: `MAX_CHUNK_SECONDS` at `MAX_RATE`
pub const MAX_CHUNK_BYTES: usize = MAX_RATE as usize * 2 * MAX_CHUNK_SECONDS;

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not holding the floor
    Unauthorized,
    /// Granted the floor
    Speaking,
    /// Rejected or disconnected
    Closed,
}

/// What the transport should do after a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Nothing to send
    None,
    /// Send the reply and keep reading
    Reply(ServerReply),
    /// Send the reply, then close the connection
    Close(ServerReply),
}

/// State of one admitted connection.
///
/// Transport-agnostic: the WebSocket handler feeds it frames and acts on the
/// returned [`SessionAction`]. Dropping the session (or its registration)
/// clears its registry slots.
#[derive(Debug)]
pub struct Session {
    registration: Registration,
    buffer: Arc<PlaybackBuffer>,
    output_rate: u32,
    client_rate: u32,
    state: SessionState,
    resampler: Resampler,
}

impl Session {
    /// Start a session for an admitted connection
    pub fn new(registration: Registration, buffer: Arc<PlaybackBuffer>, output_rate: u32) -> Self {
        Self {
            registration,
            buffer,
            output_rate,
            client_rate: output_rate,
            state: SessionState::Unauthorized,
            resampler: Resampler::new(),
        }
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.registration.id()
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sample rate the client declared for its audio
    pub fn client_rate(&self) -> u32 {
        self.client_rate
    }

    /// Handle a text frame
    pub fn on_text(&mut self, text: &str) -> SessionAction {
        let msg = match ControlMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                log::debug!("Ignoring text from {}: {}", self.id(), e);
                return SessionAction::None;
            }
        };

        match msg {
            ControlMessage::Request => match self.registration.request_speaker() {
                SpeakerGrant::Granted => {
                    self.state = SessionState::Speaking;
                    SessionAction::Reply(ServerReply::Granted)
                }
                SpeakerGrant::Rejected => {
                    self.state = SessionState::Closed;
                    SessionAction::Close(ServerReply::Rejected)
                }
            },
            ControlMessage::RateInfo(info) => {
                log::info!("Client {} sample rate: {} Hz", self.id(), info.rate);
                self.client_rate = info.rate;
                SessionAction::None
            }
        }
    }

    /// Handle a binary frame of i16 little-endian mono PCM.
    ///
    /// Audio from anyone but the current speaker is dropped, as is any chunk
    /// longer than `MAX_CHUNK_SECONDS` once converted to the output rate.
    /// Returns the number of samples queued for playback.
    pub fn on_binary(&mut self, data: &[u8]) -> usize {
        if !self.registration.is_speaker() {
            log::trace!("Dropping {} bytes from non-speaker {}", data.len(), self.id());
            return 0;
        }

        let converted = output_len(data.len() / 2, self.client_rate, self.output_rate);
        if converted > self.output_rate as usize * MAX_CHUNK_SECONDS {
            log::warn!(
                "Dropping {} byte chunk from {}: longer than {} s",
                data.len(),
                self.id(),
                MAX_CHUNK_SECONDS
            );
            return 0;
        }

        let samples = decode_pcm16(data);
        let samples = if self.client_rate == self.output_rate {
            samples
        } else {
            self.resampler.process(&samples, self.client_rate, self.output_rate)
        };

        let queued = samples.len();
        if self.buffer.append(samples) {
            queued
        } else {
            0
        }
    }

    /// End the session, releasing its registry slots
    pub fn close(mut self) {
        self.state = SessionState::Closed;
        log::debug!("Session {} closed", self.id());
    }
}

/// Decode little-endian i16 samples; a trailing odd byte is ignored
pub fn decode_pcm16(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
