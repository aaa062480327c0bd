// Scripted devices, decoders and speech services shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use loqa_speech::audio::{AudioDevice, AudioFormat, AudioStream, SourceProfile, StreamRead};
use loqa_speech::error::{AudioError, BackendError};
use loqa_speech::recognition::{
    Decoder, DecodingState, DelegatedBackend, ModelLoader, RecognitionEvent, RecognitionRequest, SpeechService,
    StreamingBackend,
};
use loqa_speech::session::{AudioInput, ChannelSink, RecognitionSession, SessionState};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Generous bound for waits; tests normally finish far sooner
pub const WAIT: Duration = Duration::from_secs(30);

// ============================================================================
// Audio
// ============================================================================

/// Tracks how a scripted device is used
#[derive(Default)]
pub struct DeviceState {
    pub in_use: AtomicBool,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
}

/// Device yielding `frames` constant frames, then end of stream (or silence if endless).
/// Only one stream may be open at a time.
pub struct ScriptedDevice {
    frames: usize,
    endless: bool,
    full_timeout: bool,
    failing: Vec<SourceProfile>,
    state: Arc<DeviceState>,
}

impl ScriptedDevice {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            endless: false,
            full_timeout: false,
            failing: Vec::new(),
            state: Arc::new(DeviceState::default()),
        }
    }

    /// Never ends; every read times out
    pub fn endless() -> Self {
        Self::endless_after(0)
    }

    /// Yields `frames` frames, then reads time out forever
    pub fn endless_after(frames: usize) -> Self {
        Self {
            endless: true,
            ..Self::new(frames)
        }
    }

    /// Never ends; every read blocks for its whole timeout
    pub fn blocking() -> Self {
        Self {
            full_timeout: true,
            ..Self::endless()
        }
    }

    pub fn failing(mut self, profile: SourceProfile) -> Self {
        self.failing.push(profile);
        self
    }

    pub fn state(&self) -> Arc<DeviceState> {
        Arc::clone(&self.state)
    }
}

impl AudioDevice for ScriptedDevice {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open_profile(&self, profile: SourceProfile, _format: AudioFormat) -> Result<Box<dyn AudioStream>, AudioError> {
        if self.failing.contains(&profile) {
            return Err(AudioError::DeviceUnavailable(format!("{:?} rejected", profile)));
        }
        if self.state.in_use.swap(true, Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable("device busy".into()));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedStream {
            remaining: self.frames,
            endless: self.endless,
            full_timeout: self.full_timeout,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct ScriptedStream {
    remaining: usize,
    endless: bool,
    full_timeout: bool,
    state: Arc<DeviceState>,
    closed: bool,
}

impl AudioStream for ScriptedStream {
    fn read_samples(&mut self, frame_samples: usize, timeout: Duration) -> Result<StreamRead, AudioError> {
        if self.closed {
            return Ok(StreamRead::EndOfStream);
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            std::thread::sleep(Duration::from_millis(1));
            return Ok(StreamRead::Samples(vec![100; frame_samples]));
        }
        if self.full_timeout {
            std::thread::sleep(timeout);
            return Ok(StreamRead::Timeout);
        }
        if self.endless {
            std::thread::sleep(timeout.min(Duration::from_millis(10)));
            return Ok(StreamRead::Timeout);
        }
        Ok(StreamRead::EndOfStream)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.in_use.store(false, Ordering::SeqCst);
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Write a 16-bit WAV clip
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

// ============================================================================
// Streaming decoder
// ============================================================================

/// Decoder output for one accepted frame
#[derive(Debug, Clone)]
pub enum Step {
    Partial(&'static str),
    Final(&'static str),
    Fail(&'static str),
}

struct ScriptedDecoder {
    steps: VecDeque<Step>,
    current: String,
    finalized: String,
    flush_text: String,
    resets: Arc<AtomicUsize>,
}

impl Decoder for ScriptedDecoder {
    fn accept_waveform(&mut self, _samples: &[i16]) -> Result<DecodingState, BackendError> {
        match self.steps.pop_front() {
            Some(Step::Partial(text)) => {
                self.current = text.to_string();
                Ok(DecodingState::Running)
            }
            Some(Step::Final(text)) => {
                self.finalized = text.to_string();
                Ok(DecodingState::Finalized)
            }
            Some(Step::Fail(code)) => Err(BackendError::BackendFailure(code.to_string())),
            None => Ok(DecodingState::Running),
        }
    }

    fn partial_result(&mut self) -> String {
        self.current.clone()
    }

    fn result(&mut self) -> String {
        std::mem::take(&mut self.finalized)
    }

    fn final_result(&mut self) -> String {
        std::mem::take(&mut self.flush_text)
    }

    fn reset(&mut self) {
        self.current.clear();
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Loader handing out decoders that replay a fixed script
pub struct ScriptedLoader {
    steps: Vec<Step>,
    flush_text: String,
    fail: bool,
    pub loads: AtomicUsize,
    pub resets: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            flush_text: String::new(),
            fail: false,
            loads: AtomicUsize::new(0),
            resets: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Text returned by the decoder at end of input
    pub fn with_flush(mut self, text: &str) -> Self {
        self.flush_text = text.to_string();
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }
}

impl ModelLoader for ScriptedLoader {
    fn load(&self, path: &Path, _sample_rate: u32) -> Result<Box<dyn Decoder>, BackendError> {
        if self.fail {
            return Err(BackendError::ModelLoad(format!("corrupt model at {}", path.display())));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDecoder {
            steps: self.steps.iter().cloned().collect(),
            current: String::new(),
            finalized: String::new(),
            flush_text: self.flush_text.clone(),
            resets: Arc::clone(&self.resets),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Delegated service
// ============================================================================

/// Speech service replaying a fixed list of events per request
pub struct ScriptedService {
    script: Vec<RecognitionEvent>,
    delay: Option<Duration>,
    hold_open: bool,
    start_error: Option<BackendError>,
    held: Mutex<Option<mpsc::Sender<RecognitionEvent>>>,
    pub requests: Mutex<Vec<RecognitionRequest>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub destroys: AtomicUsize,
}

impl ScriptedService {
    fn build(script: Vec<RecognitionEvent>, hold_open: bool) -> Self {
        Self {
            script,
            delay: None,
            hold_open,
            start_error: None,
            held: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
        }
    }

    /// Sends `script`, then closes the channel
    pub fn replying(script: Vec<RecognitionEvent>) -> Self {
        Self::build(script, false)
    }

    /// Sends nothing and keeps the channel open until stopped
    pub fn silent() -> Self {
        Self::build(Vec::new(), true)
    }

    /// Closes the channel without sending anything
    pub fn closing() -> Self {
        Self::build(Vec::new(), false)
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            start_error: Some(error),
            ..Self::build(Vec::new(), false)
        }
    }

    /// Waits `delay` before sending the script
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self.hold_open = true;
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start_listening(
        &self,
        request: RecognitionRequest,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<(), BackendError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if let Some(error) = &self.start_error {
            return Err(error.clone());
        }

        if self.hold_open {
            *self.held.lock().unwrap() = Some(events.clone());
        }

        let script = self.script.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            for event in script {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), BackendError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.held.lock().unwrap().take();
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.held.lock().unwrap().take();
        Ok(())
    }
}

// ============================================================================
// Sessions
// ============================================================================

pub type Events = mpsc::UnboundedReceiver<RecognitionEvent>;

pub fn streaming_session(loader: Arc<ScriptedLoader>, device: Arc<dyn AudioDevice>) -> (RecognitionSession, Events) {
    let backend = StreamingBackend::new(loader, 16000);
    let input = AudioInput::new(device, AudioFormat::default()).with_read_timeout(Duration::from_millis(20));
    let (sink, rx) = ChannelSink::new();
    let session = RecognitionSession::new("test-slot", backend.into(), Some(input), Arc::new(sink));
    (session, rx)
}

pub fn delegated_session(service: Arc<ScriptedService>) -> (RecognitionSession, Events) {
    let backend = DelegatedBackend::new(service);
    let (sink, rx) = ChannelSink::new();
    let session = RecognitionSession::new("test-slot", backend.into(), None, Arc::new(sink));
    (session, rx)
}

/// Temporary directory standing in for a model
pub fn model_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

pub async fn next_event(events: &mut Events) -> RecognitionEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

pub async fn wait_for_state(session: &RecognitionSession, state: SessionState) {
    let mut rx = session.subscribe_state();
    let reached = tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .map(|r| r.is_ok());
    assert!(
        matches!(reached, Ok(true)),
        "session never reached {} (now {})",
        state,
        session.state()
    );
}
