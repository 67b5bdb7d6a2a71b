// ABOUTME: Audio module for the relay
// ABOUTME: Resampling, the playback handoff buffer and cpal device I/O

/// Lock-free handoff between sessions and the audio callback
pub mod buffer;
/// cpal output stream driven by the playback buffer
pub mod output;
/// Sample rate conversion
pub mod resampler;
/// Speaker-side audio sources
pub mod source;

pub use buffer::{PlaybackBuffer, PlaybackReader, UnderrunPolicy};
pub use output::CpalOutput;
pub use resampler::{resample, Resampler};
pub use source::{MicSource, ToneSource};
