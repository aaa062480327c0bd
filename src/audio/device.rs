use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AudioError;

/// PCM format requested for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (only mono is supported)
    pub channels: u16,
    /// Bits per sample (only 16-bit signed is supported)
    pub bits_per_sample: u16,
    /// Samples per frame handed to the recognizer
    pub frame_samples: usize,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,  // Vosk models expect 16kHz
            channels: 1,         // Mono
            bits_per_sample: 16, // i16 PCM
            frame_samples: 2048, // 128ms at 16kHz
        }
    }
}

impl AudioFormat {
    /// Reject formats no device can be initialized with
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::DeviceUnavailable("sample rate must be non-zero".into()));
        }
        if self.channels != 1 {
            return Err(AudioError::DeviceUnavailable(format!(
                "unsupported channel count {} (mono only)",
                self.channels
            )));
        }
        if self.bits_per_sample != 16 {
            return Err(AudioError::DeviceUnavailable(format!(
                "unsupported bit depth {} (16-bit only)",
                self.bits_per_sample
            )));
        }
        if self.frame_samples == 0 {
            return Err(AudioError::DeviceUnavailable("frame size must be non-zero".into()));
        }
        Ok(())
    }

    /// Wall-clock length of one frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(self.frame_samples as u64 * 1_000_000 / self.sample_rate as u64)
    }
}

/// Audio sample data (16-bit PCM, mono)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Raw audio samples
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Position of this frame in the stream, starting at 0
    pub sequence: u64,
    /// Milliseconds since the source was opened
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Little-endian PCM bytes, as recognizers that take raw buffers expect
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Input profile, tried in order when opening a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceProfile {
    /// Input tuned for speech (preferred device, voice processing)
    VoiceRecognition,
    /// Any working input
    Generic,
}

/// Outcome of a single bounded read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRead {
    Frame(AudioFrame),
    /// Nothing arrived within the read timeout
    Timeout,
    EndOfStream,
}

/// Audio input capable of opening capture streams.
///
/// Implementations:
/// - `WavFileDevice`: WAV clip, for testing and batch runs
/// - `MicrophoneDevice`: cpal input (feature `microphone`)
pub trait AudioDevice: Send + Sync {
    /// Device name for logging
    fn name(&self) -> &str;

    /// Open a stream with the given profile and format
    fn open_profile(
        &self,
        profile: SourceProfile,
        format: AudioFormat,
    ) -> Result<Box<dyn AudioStream>, AudioError>;
}

/// An open capture stream yielding raw mono samples
pub trait AudioStream: Send {
    /// Read exactly one frame of `frame_samples` samples, blocking at most `timeout`
    fn read_samples(&mut self, frame_samples: usize, timeout: Duration) -> Result<StreamRead, AudioError>;

    /// Release the underlying device. Must tolerate repeated calls.
    fn close(&mut self);
}

/// Raw read result from a stream, before framing metadata is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRead {
    Samples(Vec<i16>),
    Timeout,
    EndOfStream,
}
