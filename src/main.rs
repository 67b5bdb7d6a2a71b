// ABOUTME: onair speaker client binary
// ABOUTME: Takes the floor on a relay server and streams a test tone or the microphone

use clap::Parser;
use onair::audio::{MicSource, ToneSource};
use onair::protocol::messages::ServerReply;
use onair::server::init_tracing;
use onair::SpeakerClient;
use std::time::Duration;

/// Stream audio to an onair relay
#[derive(Parser, Debug)]
#[command(name = "onair")]
#[command(author, version, about = "Speak through an onair relay", long_about = None)]
struct Args {
    /// WebSocket URL of the relay server
    #[arg(short, long, default_value = "ws://localhost:2000")]
    server: String,

    /// Stream the default microphone instead of a test tone
    #[arg(long)]
    mic: bool,

    /// Input device name (with --mic)
    #[arg(long)]
    device: Option<String>,

    /// Test tone frequency in Hz (0 for silence)
    #[arg(short, long, default_value = "440.0")]
    frequency: f64,

    /// Test tone amplitude, 0.0 to 1.0
    #[arg(short, long, default_value = "0.5")]
    amplitude: f64,

    /// Test tone sample rate in Hz
    #[arg(short, long, default_value = "48000")]
    rate: u32,

    /// Samples per message for the test tone
    #[arg(long, default_value = "256")]
    chunk: usize,

    /// Stop after this many seconds
    #[arg(long)]
    seconds: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    tracing::info!("Connecting to {}...", args.server);
    let mut client = SpeakerClient::connect(&args.server).await?;

    match client.request_speaker().await? {
        ServerReply::Granted => tracing::info!("Granted the floor"),
        ServerReply::Rejected => {
            tracing::warn!("Rejected: someone else is speaking");
            return Ok(());
        }
    }

    let deadline = args
        .seconds
        .map(|s| tokio::time::Instant::now() + Duration::from_secs_f64(s.max(0.0)));

    if args.mic {
        stream_mic(&mut client, args.device.as_deref(), deadline).await?;
    } else {
        stream_tone(&mut client, &args, deadline).await?;
    }

    client.close().await?;
    tracing::info!("Done");
    Ok(())
}

async fn stream_tone(
    client: &mut SpeakerClient,
    args: &Args,
    deadline: Option<tokio::time::Instant>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let chunk = args.chunk.max(1);
    let mut source =
        ToneSource::new(args.frequency.max(0.0), args.rate).with_amplitude(args.amplitude);
    client.announce_rate(source.sample_rate()).await?;

    tracing::info!(
        "Streaming {} Hz tone at {} Hz, {} samples per message",
        args.frequency,
        args.rate,
        chunk
    );

    // Pace sends at real time so the relay's buffer stays shallow
    let period = Duration::from_secs_f64(chunk as f64 / args.rate.max(1) as f64);
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
                client.send_audio(&source.read_chunk(chunk)).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

async fn stream_mic(
    client: &mut SpeakerClient,
    device: Option<&str>,
    deadline: Option<tokio::time::Instant>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // The capture stream must stay alive while we forward its chunks
    let (mic, mut chunks) = MicSource::open(device)?;
    client.announce_rate(mic.sample_rate()).await?;

    tracing::info!("Streaming microphone '{}' at {} Hz", mic.device_name(), mic.sample_rate());

    let until_deadline = async {
        match deadline {
            Some(d) => tokio::time::sleep_until(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(until_deadline);

    loop {
        tokio::select! {
            chunk = chunks.recv() => match chunk {
                Some(samples) => client.send_audio(&samples).await?,
                None => break,
            },
            _ = &mut until_deadline => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(mic);
    Ok(())
}
