// Microphone capture using cpal
//
// cpal streams are not Send on every platform, so each open stream lives on
// its own capture thread and hands samples over a bounded channel. Capture
// runs in the device's native config: the callback downmixes and the reader
// resamples.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::convert::StreamResampler;
use super::device::{AudioDevice, AudioFormat, AudioStream, SourceProfile, StreamRead};
use crate::error::AudioError;

/// Callback buffers queued before the reader falls behind and drops audio
const CAPTURE_QUEUE_DEPTH: usize = 64;

/// System microphone
///
/// `VoiceRecognition` opens the configured preferred input by name,
/// `Generic` opens the host default input.
pub struct MicrophoneDevice {
    preferred_device: Option<String>,
}

impl MicrophoneDevice {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self { preferred_device }
    }

    fn select(&self, profile: SourceProfile) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();
        match profile {
            SourceProfile::VoiceRecognition => {
                let wanted = self.preferred_device.as_deref().ok_or_else(|| {
                    AudioError::DeviceUnavailable("no preferred input device configured".into())
                })?;
                let mut devices = host
                    .input_devices()
                    .map_err(|e| AudioError::DeviceUnavailable(format!("listing input devices: {}", e)))?;
                devices
                    .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                    .ok_or_else(|| AudioError::DeviceUnavailable(format!("input device '{}' not found", wanted)))
            }
            SourceProfile::Generic => host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceUnavailable("no default input device".into())),
        }
    }
}

impl AudioDevice for MicrophoneDevice {
    fn name(&self) -> &str {
        "microphone"
    }

    fn open_profile(
        &self,
        profile: SourceProfile,
        format: AudioFormat,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        let device = self.select(profile)?;
        let stream = MicrophoneStream::start(device, format)?;
        Ok(Box::new(stream))
    }
}

struct MicrophoneStream {
    samples_rx: Receiver<Vec<f32>>,
    resampler: StreamResampler,
    pending: Vec<i16>,
    stop_tx: Option<mpsc::Sender<()>>,
    capture_thread: Option<JoinHandle<()>>,
}

impl MicrophoneStream {
    fn start(device: cpal::Device, format: AudioFormat) -> Result<Self, AudioError> {
        let (samples_tx, samples_rx) = mpsc::sync_channel::<Vec<f32>>(CAPTURE_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, AudioError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let capture_thread = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || run_capture(device, samples_tx, ready_tx, stop_rx))
            .map_err(|e| AudioError::DeviceUnavailable(format!("spawning capture thread: {}", e)))?;

        let native_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = capture_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = capture_thread.join();
                return Err(AudioError::DeviceUnavailable("capture thread exited during start".into()));
            }
        };

        let stream = Self {
            samples_rx,
            resampler: StreamResampler::new(native_rate, format.sample_rate)?,
            pending: Vec::with_capacity(format.frame_samples * 2),
            stop_tx: Some(stop_tx),
            capture_thread: Some(capture_thread),
        };
        if native_rate != format.sample_rate {
            info!("Resampling microphone {}Hz to {}Hz", native_rate, format.sample_rate);
        }
        Ok(stream)
    }
}

/// Open the device in its native config and forward mono f32 buffers.
/// Reports the native sample rate once the stream is playing.
fn run_capture(
    device: cpal::Device,
    samples_tx: SyncSender<Vec<f32>>,
    ready_tx: mpsc::Sender<Result<u32, AudioError>>,
    stop_rx: Receiver<()>,
) {
    let supported = match device.default_input_config() {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(format!("reading input config: {}", e))));
            return;
        }
    };
    let native_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let config = supported.config();

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, samples_tx),
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, samples_tx),
        other => Err(AudioError::DeviceUnavailable(format!("unsupported sample format {:?}", other))),
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(format!("starting input stream: {}", e))));
        return;
    }

    info!("Microphone capture started ({}Hz, {} channels)", native_rate, channels);
    let _ = ready_tx.send(Ok(native_rate));

    // Wait for close() or for the stream owner to go away
    let _ = stop_rx.recv();
    drop(stream);
    info!("Microphone capture stopped");
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples_tx: SyncSender<Vec<f32>>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels.max(1) as usize;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono: Vec<f32> = data
                    .chunks_exact(channels)
                    .map(|frame| {
                        frame.iter().map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s)).sum::<f32>()
                            / channels as f32
                    })
                    .collect();
                if let Err(TrySendError::Full(_)) = samples_tx.try_send(mono) {
                    warn!("Microphone reader is behind, dropping {} samples", data.len());
                }
            },
            |e| error!("Microphone stream error: {}", e),
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(format!("building input stream: {}", e)))
}

impl AudioStream for MicrophoneStream {
    fn read_samples(&mut self, frame_samples: usize, timeout: Duration) -> Result<StreamRead, AudioError> {
        let deadline = Instant::now() + timeout;

        while self.pending.len() < frame_samples {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.samples_rx.recv_timeout(remaining) {
                Ok(chunk) => self.resampler.push(&chunk, &mut self.pending)?,
                Err(RecvTimeoutError::Timeout) => return Ok(StreamRead::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Ok(StreamRead::EndOfStream),
            }
        }

        let rest = self.pending.split_off(frame_samples);
        let frame = std::mem::replace(&mut self.pending, rest);
        Ok(StreamRead::Samples(frame))
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.capture_thread.take() {
            if thread.join().is_err() {
                warn!("Microphone capture thread panicked");
            }
        }
        self.pending.clear();
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.close();
    }
}
