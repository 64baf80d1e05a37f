//! Audio infrastructure: sound-card capture and playback.
//!
//! The session never talks to a sound card directly.  It goes through the
//! [`AudioBackend`] trait, which opens one [`CaptureDevice`] (radio receive
//! audio) and one [`PlaybackDevice`] (radio transmit audio), both configured
//! with the same [`AudioParams`].  The pair is wrapped by
//! [`bridge::AudioBridge`], which is what the session holds.
//!
//! # Backends
//!
//! - **`alsa_backend`** – ALSA PCM devices such as `plughw:1,0` (Linux,
//!   feature `alsa`).
//! - **`mock`** – in-memory devices for tests.
//!
//! Closing a device is dropping it.

use std::fmt;
use std::sync::Arc;

use radiogw_core::protocol::messages::{BYTES_PER_SAMPLE, CHANNELS, SAMPLE_RATE_HZ};
use thiserror::Error;

#[cfg(all(feature = "alsa", target_os = "linux"))]
pub mod alsa_backend;
pub mod bridge;
pub mod mock;

/// Default ALSA device name.
pub const DEFAULT_DEVICE: &str = "plughw:1,0";

/// Default period: 160 frames = 20 ms at 8 kHz = 320 bytes.
pub const DEFAULT_PERIOD_FRAMES: usize = 160;

/// Which half of the bridge an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    Capture,
    Playback,
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamDirection::Capture => f.write_str("capture"),
            StreamDirection::Playback => f.write_str("playback"),
        }
    }
}

/// Error type for audio device operations.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open {direction} device {device}: {reason}")]
    Open {
        device: String,
        direction: StreamDirection,
        reason: String,
    },
    #[error("{direction} I/O error: {reason}")]
    Io {
        direction: StreamDirection,
        reason: String,
    },
    #[error("audio backend unavailable: {0}")]
    Unavailable(String),
}

/// Stream parameters shared by capture and playback.
///
/// Sample rate, channel count and sample format are fixed by the wire
/// protocol; only the device and the period length are configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioParams {
    /// Backend-specific device identifier.
    pub device: String,
    /// Samples per second.
    pub sample_rate: u32,
    /// Interleaved channels.
    pub channels: u16,
    /// Frames per period; one period is one SOUND message.
    pub period_frames: usize,
}

impl AudioParams {
    /// Builds parameters for `device` with the protocol's fixed format.
    pub fn new(device: impl Into<String>, period_frames: usize) -> Self {
        Self {
            device: device.into(),
            sample_rate: SAMPLE_RATE_HZ,
            channels: CHANNELS,
            period_frames,
        }
    }

    /// Size of one period in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.period_frames * self.channels as usize * BYTES_PER_SAMPLE
    }
}

impl Default for AudioParams {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE, DEFAULT_PERIOD_FRAMES)
    }
}

/// Receive-audio source (radio speaker output into the sound card).
pub trait CaptureDevice: Send {
    /// Blocks for one period and returns its bytes.
    ///
    /// An empty vector means "nothing this time" (for example after an
    /// overrun) and is not an error.
    fn read_frame(&mut self) -> Result<Vec<u8>, AudioError>;
}

/// Transmit-audio sink (sound card output into the radio microphone input).
pub trait PlaybackDevice: Send {
    /// Writes one period, blocking until the device accepts it.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), AudioError>;
}

/// Opens capture and playback devices.
pub trait AudioBackend: Send + Sync {
    fn open_capture(&self, params: &AudioParams) -> Result<Box<dyn CaptureDevice>, AudioError>;
    fn open_playback(&self, params: &AudioParams) -> Result<Box<dyn PlaybackDevice>, AudioError>;
}

/// Returns the backend compiled into this binary.
///
/// # Errors
///
/// Returns [`AudioError::Unavailable`] when no hardware backend was built in.
pub fn default_backend() -> Result<Arc<dyn AudioBackend>, AudioError> {
    #[cfg(all(feature = "alsa", target_os = "linux"))]
    {
        Ok(Arc::new(alsa_backend::AlsaBackend))
    }

    #[cfg(not(all(feature = "alsa", target_os = "linux")))]
    {
        Err(AudioError::Unavailable(
            "built without the `alsa` feature or not on Linux".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_match_wire_format() {
        let params = AudioParams::default();
        assert_eq!(params.sample_rate, 8_000);
        assert_eq!(params.channels, 1);
        assert_eq!(params.period_frames, 160);
        assert_eq!(params.frame_bytes(), 320);
    }

    #[test]
    fn test_frame_bytes_scales_with_period() {
        assert_eq!(AudioParams::new("hw:0", 80).frame_bytes(), 160);
    }

    #[test]
    fn test_open_error_mentions_device_and_direction() {
        let err = AudioError::Open {
            device: "plughw:9,0".to_string(),
            direction: StreamDirection::Playback,
            reason: "No such file or directory".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("playback"));
        assert!(text.contains("plughw:9,0"));
    }
}
