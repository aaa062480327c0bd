use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use super::convert;
use super::device::{AudioDevice, AudioFormat, AudioStream, SourceProfile, StreamRead};
use crate::error::AudioError;

/// A WAV clip decoded into memory
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AudioError> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).map_err(|e| {
            AudioError::DeviceUnavailable(format!("failed to open WAV file {}: {}", path.display(), e))
        })?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(AudioError::DeviceUnavailable(format!(
                "{}: expected 16-bit PCM, got {}-bit {:?}",
                path.display(),
                spec.bits_per_sample,
                spec.sample_format
            )));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AudioError::Read(format!("failed to read samples: {}", e)))?;

        let duration_seconds = samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Audio device backed by a WAV file.
///
/// Every profile opens the same clip. With `realtime` set, each read waits
/// one frame duration so the clip plays back at capture speed.
pub struct WavFileDevice {
    path: PathBuf,
    name: String,
    realtime: bool,
}

impl WavFileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("wav:{}", path.display());
        Self {
            path,
            name,
            realtime: false,
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl AudioDevice for WavFileDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_profile(
        &self,
        _profile: SourceProfile,
        format: AudioFormat,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        let clip = AudioFile::open(&self.path)?;
        let samples =
            convert::to_session_format(&clip.samples, clip.sample_rate, clip.channels, format.sample_rate)?;

        Ok(Box::new(WavStream {
            samples,
            position: 0,
            pace: self.realtime.then(|| format.frame_duration()),
            next_due: None,
            closed: false,
        }))
    }
}

struct WavStream {
    samples: Vec<i16>,
    position: usize,
    pace: Option<Duration>,
    next_due: Option<Instant>,
    closed: bool,
}

impl AudioStream for WavStream {
    fn read_samples(&mut self, frame_samples: usize, timeout: Duration) -> Result<StreamRead, AudioError> {
        if self.closed || self.position >= self.samples.len() {
            return Ok(StreamRead::EndOfStream);
        }

        if let Some(pace) = self.pace {
            let now = Instant::now();
            let due = *self.next_due.get_or_insert(now + pace);
            if due > now + timeout {
                std::thread::sleep(timeout);
                return Ok(StreamRead::Timeout);
            }
            std::thread::sleep(due.saturating_duration_since(now));
            self.next_due = Some(due + pace);
        }

        // The last frame is zero-padded to keep frames fixed-size
        let end = (self.position + frame_samples).min(self.samples.len());
        let mut frame = self.samples[self.position..end].to_vec();
        frame.resize(frame_samples, 0);
        self.position = end;

        Ok(StreamRead::Samples(frame))
    }

    fn close(&mut self) {
        self.closed = true;
        self.samples = Vec::new();
    }
}
