// ABOUTME: onair relay server binary
// ABOUTME: Plays the current speaker's audio on the local output device

use clap::Parser;
use onair::audio::{CpalOutput, PlaybackBuffer};
use onair::server::{spawn_audio_engine, RelayServer, ServerArgs};

#[derive(Parser, Debug)]
#[command(name = "onair-server")]
#[command(author, version, about = "Single-speaker live audio relay", long_about = None)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Initialize tracing
    args.server.init_tracing();

    // Log startup info
    args.server.log_startup_info();

    // Create server configuration
    let config = args.server.build_config();

    let (buffer, reader) =
        PlaybackBuffer::with_limit(config.max_buffered_samples(), config.underrun);

    // Either a real device or a timer pulls from the buffer; keep both alive until shutdown
    let (engine, output) = if args.server.no_audio {
        tracing::info!("Audio: disabled, discarding playback");
        let engine = spawn_audio_engine(reader, config.block_size, config.block_period());
        (Some(engine), None)
    } else {
        let output = CpalOutput::open(
            config.device.as_deref(),
            config.output_rate,
            config.block_size,
            reader,
        )?;
        (None, Some(output))
    };

    let server = RelayServer::new(config, buffer);
    let registry = server.registry();
    let buffer = server.buffer();

    // Spawn a task to periodically report relay state
    let report_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            let count = registry.connection_count();
            if count > 0 {
                tracing::info!(
                    "Connections: {}, speaker: {}, queued: {} samples, underruns: {}, dropped: {}",
                    count,
                    registry
                        .active_speaker()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    buffer.len(),
                    buffer.underruns(),
                    buffer.dropped()
                );
            }
        }
    });

    tracing::info!("Press Ctrl+C to stop");

    let result = server.run().await;
    report_task.abort();

    if let Some((handle, shutdown)) = engine {
        let _ = shutdown.send(true);
        let _ = handle.await;
    }
    drop(output);

    result
}
