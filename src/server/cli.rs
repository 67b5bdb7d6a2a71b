// ABOUTME: CLI argument parsing and server builder utilities
// ABOUTME: Maps command-line flags onto ServerConfig and sets up tracing

use crate::audio::UnderrunPolicy;
use crate::server::registry::AdmissionPolicy;
use crate::server::ServerConfig;
use clap::Args;
use std::net::SocketAddr;

/// Relay server arguments
///
/// Use with `#[command(flatten)]` in the binary's Args struct.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:2000")]
    pub bind: SocketAddr,

    /// WebSocket endpoint path
    #[arg(long, default_value = "/")]
    pub path: String,

    /// Output sample rate in Hz
    #[arg(short, long, default_value = "48000")]
    pub rate: u32,

    /// Frames per audio callback
    #[arg(long, default_value = "256")]
    pub block_size: u32,

    /// Whether extra connections are refused outright or only denied the floor
    #[arg(long, value_enum, default_value = "single-speaker")]
    pub admission: AdmissionPolicy,

    /// What to play when less than one block is queued
    #[arg(long, value_enum, default_value = "silence")]
    pub underrun: UnderrunPolicy,

    /// Cap on queued audio in milliseconds (unbounded if omitted)
    #[arg(long)]
    pub max_buffer_ms: Option<u64>,

    /// Output device name (default device if omitted)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Run without an audio device, discarding audio at the playback rate
    #[arg(long)]
    pub no_audio: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    /// Initialize tracing based on verbosity flag
    pub fn init_tracing(&self) {
        init_tracing(self.verbose);
    }

    /// Log startup information
    pub fn log_startup_info(&self) {
        tracing::info!("onair relay v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("Bind: {}", self.bind);
        tracing::info!("Endpoint: ws://{}{}", self.bind, self.path);
        tracing::info!(
            "Playback: {} Hz mono, {} frame blocks, underrun={}",
            self.rate,
            self.block_size,
            self.underrun.as_str()
        );
        tracing::info!("Admission: {}", self.admission.as_str());
        match self.max_buffer_ms {
            Some(ms) => tracing::info!("Buffer cap: {} ms", ms),
            None => tracing::info!("Buffer cap: none"),
        }
    }

    /// Build ServerConfig from these args
    pub fn build_config(&self) -> ServerConfig {
        ServerConfig::new()
            .bind_addr(self.bind)
            .ws_path(self.path.clone())
            .output_rate(self.rate)
            .block_size(self.block_size)
            .admission(self.admission)
            .underrun(self.underrun)
            .max_buffer_ms(self.max_buffer_ms)
            .device(self.device.clone())
    }
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose { "onair=debug" } else { "onair=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
