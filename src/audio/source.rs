use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::device::{AudioDevice, AudioFormat, AudioFrame, AudioStream, FrameRead, SourceProfile, StreamRead};
use crate::error::AudioError;

/// Profiles tried when none are configured: speech-tuned first, then any input
pub const DEFAULT_PROFILES: [SourceProfile; 2] = [SourceProfile::VoiceRecognition, SourceProfile::Generic];

/// Fixed-size PCM frames from an audio device.
///
/// Frames are numbered from 0 and carry a timestamp relative to `open`.
/// The stream is closed on `close()` or on drop, whichever comes first.
pub struct AudioFrameSource {
    device_name: String,
    profile: SourceProfile,
    format: AudioFormat,
    stream: Option<Box<dyn AudioStream>>,
    sequence: u64,
    opened_at: Instant,
}

impl AudioFrameSource {
    /// Open `device` with the default profile fallback
    pub fn open(device: &Arc<dyn AudioDevice>, format: AudioFormat) -> Result<Self, AudioError> {
        Self::open_with_profiles(device, format, &DEFAULT_PROFILES)
    }

    /// Open `device`, trying each profile in order.
    ///
    /// Fails with `DeviceUnavailable` only if every profile fails.
    pub fn open_with_profiles(
        device: &Arc<dyn AudioDevice>,
        format: AudioFormat,
        profiles: &[SourceProfile],
    ) -> Result<Self, AudioError> {
        format.validate()?;

        let mut failures = Vec::new();
        for &profile in profiles {
            match device.open_profile(profile, format) {
                Ok(stream) => {
                    info!(
                        "Audio source opened: {} ({:?}, {}Hz, {} samples/frame)",
                        device.name(),
                        profile,
                        format.sample_rate,
                        format.frame_samples
                    );
                    return Ok(Self {
                        device_name: device.name().to_string(),
                        profile,
                        format,
                        stream: Some(stream),
                        sequence: 0,
                        opened_at: Instant::now(),
                    });
                }
                Err(e) => {
                    warn!("Audio profile {:?} failed on {}: {}", profile, device.name(), e);
                    failures.push(format!("{:?}: {}", profile, e));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no profiles to try".to_string());
        }
        Err(AudioError::DeviceUnavailable(format!(
            "{}: {}",
            device.name(),
            failures.join("; ")
        )))
    }

    /// Read the next frame, blocking at most `timeout`
    pub fn read_frame(&mut self, timeout: Duration) -> Result<FrameRead, AudioError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(FrameRead::EndOfStream);
        };

        match stream.read_samples(self.format.frame_samples, timeout)? {
            StreamRead::Samples(samples) => {
                let frame = AudioFrame {
                    samples,
                    sample_rate: self.format.sample_rate,
                    channels: self.format.channels,
                    sequence: self.sequence,
                    timestamp_ms: self.opened_at.elapsed().as_millis() as u64,
                };
                self.sequence += 1;
                Ok(FrameRead::Frame(frame))
            }
            StreamRead::Timeout => Ok(FrameRead::Timeout),
            StreamRead::EndOfStream => Ok(FrameRead::EndOfStream),
        }
    }

    /// Close the underlying stream. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            info!(
                "Audio source closed: {} ({} frames read)",
                self.device_name, self.sequence
            );
        } else {
            debug!("Audio source {} already closed", self.device_name);
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Profile that succeeded at open
    pub fn profile(&self) -> SourceProfile {
        self.profile
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Number of frames produced so far
    pub fn frames_read(&self) -> u64 {
        self.sequence
    }
}

impl Drop for AudioFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
