// ABOUTME: cpal output stream fed by the playback buffer
// ABOUTME: Fixed-size blocks pulled on the real-time audio thread, silence on underrun

use crate::audio::buffer::PlaybackReader;
use crate::error::Error;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    SupportedBufferSize,
};

/// Audio output playing the relay's playback buffer.
///
/// The stream stops when this value is dropped. `cpal::Stream` is not `Send`
/// on every platform, so keep it on the thread that opened it.
pub struct CpalOutput {
    _stream: Stream,
    device_name: String,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl CpalOutput {
    /// Open an output device and start playing from `reader`.
    ///
    /// # Arguments
    /// * `device_name` - Output device name, `None` for the default device
    /// * `sample_rate` - Fixed output rate in Hz
    /// * `block_size` - Frames handed to the reader per pull
    /// * `reader` - Consumer side of the playback buffer
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        block_size: u32,
        reader: PlaybackReader,
    ) -> Result<Self, Error> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::Output(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| Error::Output(format!("Output device not found: {}", name)))?,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::Output("No default output device".to_string()))?,
        };
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let (channels, sample_format, buffer_size) =
            pick_stream_format(&device, sample_rate, block_size)?;
        let policy = reader.policy();

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size,
        };

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, reader, block_size),
            SampleFormat::F32 => build_stream::<f32>(&device, &config, reader, block_size),
            other => Err(Error::Output(format!("Unsupported sample format: {:?}", other))),
        }?;

        stream
            .play()
            .map_err(|e| Error::Output(format!("Failed to start playback: {}", e)))?;

        log::info!(
            "Audio output on '{}': {} Hz, {} channel(s), {:?}, buffer {:?}, underrun={}",
            device_name,
            sample_rate,
            channels,
            sample_format,
            config.buffer_size,
            policy.as_str()
        );

        Ok(Self {
            _stream: stream,
            device_name,
            config,
            sample_format,
        })
    }

    /// List available output device names
    pub fn list_devices() -> Result<Vec<String>, Error> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| Error::Output(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    /// Name of the device being played on
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stream configuration in use
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Device sample format
    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }
}

/// Prefer mono, fall back to stereo; prefer i16, fall back to f32
fn pick_stream_format(
    device: &Device,
    sample_rate: u32,
    block_size: u32,
) -> Result<(u16, SampleFormat, BufferSize), Error> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::Output(format!("Failed to get supported configs: {}", e)))?
        .collect();

    for channels in [1u16, 2] {
        for format in [SampleFormat::I16, SampleFormat::F32] {
            let found = configs.iter().find(|c| {
                c.channels() == channels
                    && c.sample_format() == format
                    && c.min_sample_rate().0 <= sample_rate
                    && c.max_sample_rate().0 >= sample_rate
            });

            if let Some(range) = found {
                let buffer_size = match range.buffer_size() {
                    SupportedBufferSize::Range { min, max }
                        if (*min..=*max).contains(&block_size) =>
                    {
                        BufferSize::Fixed(block_size)
                    }
                    SupportedBufferSize::Range { .. } => {
                        log::warn!(
                            "Device cannot use {} frame buffers, using its default",
                            block_size
                        );
                        BufferSize::Default
                    }
                    SupportedBufferSize::Unknown => BufferSize::Fixed(block_size),
                };
                return Ok((channels, format, buffer_size));
            }
        }
    }

    Err(Error::Output(format!(
        "No compatible output format found (need {} Hz mono or stereo, i16 or f32)",
        sample_rate
    )))
}

/// Build an output stream that pulls mono blocks and writes them to every channel
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut reader: PlaybackReader,
    block_size: u32,
) -> Result<Stream, Error>
where
    T: Sample + SizedSample + FromSample<i16>,
{
    let channels = config.channels as usize;
    // Allocated once, here; the callback only reuses it
    let mut block = vec![0i16; block_size.max(1) as usize];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for piece in data.chunks_mut(block.len() * channels) {
                    let frames = piece.len() / channels;
                    let mono = &mut block[..frames];
                    reader.fill(mono);

                    for (frame, &sample) in piece.chunks_mut(channels).zip(mono.iter()) {
                        let value = T::from_sample(sample);
                        for slot in frame {
                            *slot = value;
                        }
                    }
                }
            },
            |err: cpal::StreamError| log::error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| Error::Output(format!("Failed to build output stream: {}", e)))
}
