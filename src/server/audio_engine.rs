// ABOUTME: Headless playback engine for running without an audio device
// ABOUTME: Drains the playback buffer in fixed blocks on a block-period timer

use crate::audio::PlaybackReader;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Audio engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine is stopped
    Stopped,
    /// Engine is running and consuming blocks
    Running,
}

/// Stand-in for the device callback: pulls one block per period and discards it.
///
/// Useful on machines without a sound card, where the buffer would otherwise
/// grow without bound while a speaker is streaming.
pub struct AudioEngine {
    /// Consumer side of the playback buffer
    reader: PlaybackReader,
    /// Reused block, one callback's worth of frames
    block: Vec<i16>,
    /// Wall-clock duration of one block
    period: Duration,
    /// Current engine state
    state: EngineState,
    /// Samples of real audio consumed so far
    samples_played: u64,
}

impl AudioEngine {
    /// Create a new audio engine
    pub fn new(reader: PlaybackReader, block_size: u32, period: Duration) -> Self {
        Self {
            reader,
            block: vec![0; block_size.max(1) as usize],
            period,
            state: EngineState::Stopped,
            samples_played: 0,
        }
    }

    /// Get the current state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Samples of real audio consumed so far
    pub fn samples_played(&self) -> u64 {
        self.samples_played
    }

    /// Run the audio engine loop
    ///
    /// This should be spawned as a separate task
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "Headless audio engine started: {} frames every {}us",
            self.block.len(),
            self.period.as_micros()
        );

        self.state = EngineState::Running;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.pull_block();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("Audio engine shutting down");
                        break;
                    }
                }
            }
        }

        self.state = EngineState::Stopped;
    }

    /// Consume one block, as the device callback would
    fn pull_block(&mut self) -> usize {
        let played = self.reader.fill(&mut self.block);
        self.samples_played += played as u64;
        played
    }
}

/// Spawn an audio engine task
pub fn spawn_audio_engine(
    reader: PlaybackReader,
    block_size: u32,
    period: Duration,
) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut engine = AudioEngine::new(reader, block_size, period);
        engine.run(shutdown_rx).await;
    });

    (handle, shutdown_tx)
}
