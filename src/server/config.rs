// ABOUTME: Server configuration
// ABOUTME: Defines configurable parameters for the relay server and its playback

use crate::audio::UnderrunPolicy;
use crate::server::registry::AdmissionPolicy;
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// WebSocket endpoint path
    pub ws_path: String,
    /// Fixed output sample rate in Hz
    pub output_rate: u32,
    /// Frames per audio callback
    pub block_size: u32,
    /// Whether a second connection is turned away or only denied the floor
    pub admission: AdmissionPolicy,
    /// What the audio callback plays when not enough audio is queued
    pub underrun: UnderrunPolicy,
    /// Optional cap on queued audio in milliseconds (unbounded when `None`)
    pub max_buffer_ms: Option<u64>,
    /// Output device name (default device when `None`)
    pub device: Option<String>,
}

impl ServerConfig {
    /// Create a new server configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the WebSocket path
    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Set the output sample rate
    pub fn output_rate(mut self, rate: u32) -> Self {
        self.output_rate = rate;
        self
    }

    /// Set the callback block size in frames
    pub fn block_size(mut self, frames: u32) -> Self {
        self.block_size = frames;
        self
    }

    /// Set the admission policy
    pub fn admission(mut self, policy: AdmissionPolicy) -> Self {
        self.admission = policy;
        self
    }

    /// Set the underrun policy
    pub fn underrun(mut self, policy: UnderrunPolicy) -> Self {
        self.underrun = policy;
        self
    }

    /// Cap queued audio at `ms` milliseconds
    pub fn max_buffer_ms(mut self, ms: Option<u64>) -> Self {
        self.max_buffer_ms = ms;
        self
    }

    /// Select an output device by name
    pub fn device(mut self, name: Option<String>) -> Self {
        self.device = name;
        self
    }

    /// Queued-sample cap derived from `max_buffer_ms`
    pub fn max_buffered_samples(&self) -> Option<usize> {
        self.max_buffer_ms
            .map(|ms| (self.output_rate as u64 * ms / 1000) as usize)
    }

    /// Wall-clock duration of one callback block
    pub fn block_period(&self) -> Duration {
        Duration::from_micros(self.block_size as u64 * 1_000_000 / self.output_rate.max(1) as u64)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 2000)),
            ws_path: "/".to_string(),
            output_rate: 48000,
            block_size: 256,
            admission: AdmissionPolicy::default(),
            underrun: UnderrunPolicy::default(),
            max_buffer_ms: None,
            device: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 2000);
        assert_eq!(config.output_rate, 48000);
        assert_eq!(config.block_size, 256);
        assert_eq!(config.admission, AdmissionPolicy::SingleSpeaker);
        assert_eq!(config.underrun, UnderrunPolicy::Silence);
        assert_eq!(config.max_buffered_samples(), None);
    }

    #[test]
    fn test_derived_values() {
        let config = ServerConfig::new().max_buffer_ms(Some(500));
        assert_eq!(config.max_buffered_samples(), Some(24000));
        // 256 frames at 48 kHz
        assert_eq!(config.block_period(), Duration::from_micros(5333));
    }
}
