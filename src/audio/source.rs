// ABOUTME: Speaker-side audio sources
// ABOUTME: Provides a test tone and microphone capture as mono i16 chunks

use crate::error::Error;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::f64::consts::PI;
use tokio::sync::mpsc;

/// Convert a float sample in [-1.0, 1.0] to i16 by scaling with 0x7FFF
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    // `as` saturates out-of-range values
    (sample * 0x7FFF as f32) as i16
}

/// Average interleaved frames down to one channel
pub fn downmix<T: Copy>(data: &[T], channels: usize, convert: impl Fn(T) -> f32) -> Vec<i16> {
    let channels = channels.max(1);
    data.chunks(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| convert(s)).sum();
            f32_to_i16(sum / frame.len() as f32)
        })
        .collect()
}

/// Test tone source (generates a mono sine wave)
pub struct ToneSource {
    frequency: f64,
    sample_rate: u32,
    phase: f64,
    amplitude: f64,
}

impl ToneSource {
    /// Create a new test tone source
    ///
    /// # Arguments
    /// * `frequency` - Tone frequency in Hz (e.g., 440.0 for A4, 0 for silence)
    /// * `sample_rate` - Sample rate in Hz (e.g., 48000)
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        Self {
            frequency,
            sample_rate,
            phase: 0.0,
            // Use 50% amplitude to avoid clipping
            amplitude: 0.5 * i16::MAX as f64,
        }
    }

    /// Set the amplitude (0.0 to 1.0)
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0) * i16::MAX as f64;
        self
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Generate the next `samples` samples
    pub fn read_chunk(&mut self, samples: usize) -> Vec<i16> {
        let phase_increment = 2.0 * PI * self.frequency / self.sample_rate as f64;

        (0..samples)
            .map(|_| {
                let value = (self.phase.sin() * self.amplitude) as i16;
                self.phase += phase_increment;
                if self.phase >= 2.0 * PI {
                    self.phase -= 2.0 * PI;
                }
                value
            })
            .collect()
    }
}

/// Microphone capture on the default (or named) input device.
///
/// Captured audio is downmixed to mono i16 and delivered through the
/// receiver returned by [`MicSource::open`], one chunk per device callback.
/// Capture stops when this value is dropped.
pub struct MicSource {
    _stream: Stream,
    sample_rate: u32,
    device_name: String,
}

impl MicSource {
    /// Open an input device and start capturing
    pub fn open(
        device_name: Option<&str>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Vec<i16>>), Error> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| Error::Input(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| Error::Input(format!("Input device not found: {}", name)))?,
            None => host
                .default_input_device()
                .ok_or_else(|| Error::Input("No default input device".to_string()))?,
        };
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| Error::Input(format!("Failed to get input config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config = supported.config();
        let channels = config.channels as usize;

        let (tx, rx) = mpsc::unbounded_channel();
        let on_error = |err: cpal::StreamError| log::error!("Audio input stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(downmix(data, channels, |s| s));
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(downmix(data, channels, |s| s as f32 / 0x7FFF as f32));
                },
                on_error,
                None,
            ),
            other => {
                return Err(Error::Input(format!("Unsupported input format: {:?}", other)));
            }
        }
        .map_err(|e| Error::Input(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::Input(format!("Failed to start capture: {}", e)))?;

        log::info!(
            "Capturing from '{}': {} Hz, {} channel(s), {:?}",
            device_name,
            config.sample_rate.0,
            channels,
            sample_format
        );

        Ok((
            Self {
                _stream: stream,
                sample_rate: config.sample_rate.0,
                device_name,
            },
            rx,
        ))
    }

    /// Capture sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Name of the capture device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_generates_samples() {
        let mut source = ToneSource::new(440.0, 48000);
        let samples = source.read_chunk(960);

        assert_eq!(samples.len(), 960);
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 16000 && peak <= i16::MAX as u16 / 2 + 1);
    }

    #[test]
    fn test_tone_is_continuous_across_chunks() {
        let mut split = ToneSource::new(1000.0, 16000);
        let mut whole = ToneSource::new(1000.0, 16000);

        let mut joined = split.read_chunk(100);
        joined.extend(split.read_chunk(60));
        let reference = whole.read_chunk(160);

        let max_diff = joined
            .iter()
            .zip(&reference)
            .map(|(a, b)| (*a as i32 - *b as i32).abs())
            .max()
            .unwrap();
        assert!(max_diff <= 1);
    }

    #[test]
    fn test_tone_amplitude() {
        let mut quiet = ToneSource::new(440.0, 48000).with_amplitude(0.1);
        let peak = quiet.read_chunk(960).iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 3000 && peak <= 3277);

        let mut loud = ToneSource::new(440.0, 48000).with_amplitude(4.0);
        let peak = loud.read_chunk(960).iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 32000);
    }

    #[test]
    fn test_zero_frequency_is_silence() {
        let mut source = ToneSource::new(0.0, 48000);
        assert!(source.read_chunk(64).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_f32_to_i16_scaling() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), 0x7FFF);
        assert_eq!(f32_to_i16(-1.0), -0x7FFF);
        assert_eq!(f32_to_i16(0.5), 16383);
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
    }

    #[test]
    fn test_downmix_stereo() {
        let data = [1.0f32, 0.0, -0.5, -0.5, 0.25, 0.75];
        assert_eq!(downmix(&data, 2, |s| s), vec![16383, -16383, 16383]);
    }
}
