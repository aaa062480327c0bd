use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::{AudioInput, EVENT_HISTORY_LIMIT, READER_JOIN_TIMEOUT};
use super::emitter::{AttemptEmitter, Envelope};
use super::sink::EventSink;
use super::state::SessionState;
use super::stats::{EventRecord, SessionCounters, SessionStats};
use crate::audio::{AudioFrameSource, FrameRead};
use crate::error::{AudioError, BackendError, ErrorKind, SessionError};
use crate::recognition::{BackendKind, RecognitionBackend, RecognitionConfig, RecognitionEvent};

/// Identifies a session in the registry and to the host
pub type SessionHandle = Uuid;

/// A recognition session driving one backend on behalf of one host slot.
///
/// Commands (`start`, `stop`, `release`, `load_model`) are serialized by an
/// internal mutex. Results reach the sink through a dispatcher task owned by
/// the session, never directly from the audio reader or request task.
///
/// Must be created inside a Tokio runtime.
pub struct RecognitionSession {
    shared: Arc<Shared>,
}

struct Shared {
    handle: SessionHandle,
    slot: String,
    backend: Arc<RecognitionBackend>,
    audio: Option<AudioInput>,
    core: Mutex<Core>,
    state: watch::Sender<SessionState>,
    events_tx: mpsc::UnboundedSender<Envelope>,
    counters: SessionCounters,
    history: std::sync::Mutex<VecDeque<EventRecord>>,
    created_at: DateTime<Utc>,
}

struct Core {
    generation: u64,
    attempt: Option<Attempt>,
    last_started_at: Option<DateTime<Utc>>,
}

/// Resources of the attempt in progress
struct Attempt {
    emitter: AttemptEmitter,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
}

impl RecognitionSession {
    /// Create an idle session.
    ///
    /// Streaming backends need `audio`; delegated backends ignore it.
    pub fn new(
        slot: impl Into<String>,
        backend: RecognitionBackend,
        audio: Option<AudioInput>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Idle);

        let shared = Arc::new(Shared {
            handle: Uuid::new_v4(),
            slot: slot.into(),
            backend: Arc::new(backend),
            audio,
            core: Mutex::new(Core {
                generation: 0,
                attempt: None,
                last_started_at: None,
            }),
            state,
            events_tx,
            counters: SessionCounters::default(),
            history: std::sync::Mutex::new(VecDeque::new()),
            created_at: Utc::now(),
        });

        tokio::spawn(dispatch(events_rx, sink, Arc::downgrade(&shared)));

        info!(
            "Created {} session {} for slot '{}'",
            shared.backend.kind(),
            shared.handle,
            shared.slot
        );

        Self { shared }
    }

    pub fn handle(&self) -> SessionHandle {
        self.shared.handle
    }

    pub fn slot(&self) -> &str {
        &self.shared.slot
    }

    pub fn kind(&self) -> BackendKind {
        self.shared.backend.kind()
    }

    pub fn backend(&self) -> &RecognitionBackend {
        &self.shared.backend
    }

    pub fn state(&self) -> SessionState {
        self.shared.current_state()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Load a model for the streaming backend. Runs on a blocking worker.
    pub async fn load_model(&self, path: impl Into<PathBuf>) -> Result<(), SessionError> {
        if self.state() == SessionState::Released {
            return Err(SessionError::Released);
        }

        let path = path.into();
        let backend = Arc::clone(&self.shared.backend);
        info!("Session {} loading model from {}", self.shared.handle, path.display());

        tokio::task::spawn_blocking(move || backend.load_model(&path))
            .await
            .map_err(|e| BackendError::BackendFailure(format!("model loader panicked: {}", e)))??;

        Ok(())
    }

    /// Begin an attempt.
    ///
    /// Ignored unless the session is idle. Start failures are reported to the
    /// sink and returned; the session stays idle.
    pub async fn start(&self, config: RecognitionConfig) -> Result<(), SessionError> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;

        match shared.current_state() {
            SessionState::Released => return Err(SessionError::Released),
            SessionState::Idle => {}
            state => {
                debug!("Session {} start ignored while {}", shared.handle, state);
                return Ok(());
            }
        }
        config.validate()?;

        core.generation += 1;
        core.last_started_at = Some(Utc::now());
        shared.counters.attempts.fetch_add(1, Ordering::SeqCst);
        shared.set_state(SessionState::Starting);

        let emitter = AttemptEmitter::new(core.generation, shared.events_tx.clone());
        let cancel = Arc::new(AtomicBool::new(false));

        info!(
            "Starting session {} (attempt {}, language {}, timeout {:?})",
            shared.handle,
            emitter.generation(),
            config.language.as_deref().unwrap_or("default"),
            config.effective_timeout()
        );

        match shared.launch(&config, &emitter, &cancel).await {
            Ok(worker) => {
                let timer = spawn_timer(emitter.clone(), config.effective_timeout(), shared.handle);
                core.attempt = Some(Attempt {
                    emitter,
                    cancel,
                    worker: Some(worker),
                    timer: Some(timer),
                });
                shared.set_state(SessionState::Listening);
                info!("Session {} listening", shared.handle);
                Ok(())
            }
            Err(e) => {
                warn!("Session {} failed to start: {}", shared.handle, e);
                emitter.emit(error_event(&e));
                emitter.close();
                shared.set_state(SessionState::Idle);
                Err(e)
            }
        }
    }

    /// Stop the current attempt, if any. No event is emitted.
    pub async fn stop(&self) {
        let mut core = self.shared.core.lock().await;
        match self.shared.current_state() {
            SessionState::Idle | SessionState::Released => {
                debug!("Session {} stop: nothing to stop", self.shared.handle);
            }
            _ => self.shared.teardown(&mut core, "stop requested").await,
        }
    }

    /// Stop and free every resource. The session cannot be restarted.
    pub async fn release(&self) {
        let mut core = self.shared.core.lock().await;
        if self.shared.current_state() == SessionState::Released {
            return;
        }

        self.shared.teardown(&mut core, "release requested").await;
        self.shared.backend.release().await;
        self.shared.set_state(SessionState::Released);
        let _ = self.shared.events_tx.send(Envelope::Shutdown);

        info!("Session {} released", self.shared.handle);
    }

    /// Events delivered so far (most recent last, bounded)
    pub fn events(&self) -> Vec<EventRecord> {
        let history = self.shared.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.iter().cloned().collect()
    }

    pub async fn stats(&self) -> SessionStats {
        let last_started_at = self.shared.core.lock().await.last_started_at;
        let counters = &self.shared.counters;

        SessionStats {
            handle: self.shared.handle,
            slot: self.shared.slot.clone(),
            backend: self.kind(),
            state: self.state(),
            created_at: self.shared.created_at,
            last_started_at,
            attempts: counters.attempts.load(Ordering::SeqCst),
            partials: counters.partials.load(Ordering::SeqCst),
            finals: counters.finals.load(Ordering::SeqCst),
            errors: counters.errors.load(Ordering::SeqCst),
        }
    }
}

impl Shared {
    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Session {}: {} -> {}", self.handle, previous, state);
        }
    }

    fn record(&self, event: &RecognitionEvent) {
        self.counters.record(event);
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() == EVENT_HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(EventRecord {
            event: event.clone(),
            delivered_at: Utc::now(),
        });
    }

    /// Start the backend and spawn the task that feeds it
    async fn launch(
        &self,
        config: &RecognitionConfig,
        emitter: &AttemptEmitter,
        cancel: &Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, SessionError> {
        self.backend.start(config)?;

        if !self.backend.consumes_frames() {
            let backend = Arc::clone(&self.backend);
            let emitter = emitter.clone();
            let config = config.clone();
            return Ok(tokio::spawn(run_request(backend, config, emitter)));
        }

        let (source, read_timeout) = match self.open_source() {
            Ok(opened) => opened,
            Err(e) => {
                self.backend.stop().await;
                return Err(e.into());
            }
        };

        let backend = Arc::clone(&self.backend);
        let emitter = emitter.clone();
        let cancel = Arc::clone(cancel);
        let continuous = config.continuous;

        Ok(tokio::task::spawn_blocking(move || {
            run_reader(source, backend, emitter, cancel, read_timeout, continuous)
        }))
    }

    fn open_source(&self) -> Result<(AudioFrameSource, Duration), AudioError> {
        let audio = self.audio.as_ref().ok_or_else(|| {
            AudioError::DeviceUnavailable("no audio input configured for streaming session".into())
        })?;
        let source = AudioFrameSource::open_with_profiles(&audio.device, audio.format, &audio.profiles)?;
        Ok((source, audio.read_timeout))
    }

    /// Tear down the current attempt and return to idle
    async fn teardown(&self, core: &mut Core, reason: &str) {
        let Some(mut attempt) = core.attempt.take() else {
            if self.current_state() != SessionState::Released {
                self.set_state(SessionState::Idle);
            }
            return;
        };

        self.set_state(SessionState::Stopping);
        debug!(
            "Session {} tearing down attempt {}: {}",
            self.handle,
            attempt.emitter.generation(),
            reason
        );

        attempt.emitter.close();
        attempt.cancel.store(true, Ordering::SeqCst);
        if let Some(timer) = attempt.timer.take() {
            timer.abort();
        }

        if let Some(worker) = attempt.worker.take() {
            if !self.backend.consumes_frames() {
                worker.abort();
            }
            match tokio::time::timeout(READER_JOIN_TIMEOUT, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => error!("Session {} worker panicked: {}", self.handle, e),
                Err(_) => warn!(
                    "Session {} reader did not exit within {:?}",
                    self.handle, READER_JOIN_TIMEOUT
                ),
            }
        }

        self.backend.stop().await;
        self.set_state(SessionState::Idle);
        info!("Session {} stopped ({})", self.handle, reason);
    }

    /// Called by the dispatcher once an attempt ended on its own.
    ///
    /// Returns false if the host already tore the attempt down.
    async fn finish_attempt(&self, generation: u64) -> bool {
        let mut core = self.core.lock().await;
        let current = core.attempt.as_ref().map(|a| a.emitter.generation());
        if current == Some(generation) {
            self.teardown(&mut core, "attempt finished").await;
            true
        } else {
            debug!(
                "Session {} ignoring end of stale attempt {}",
                self.handle, generation
            );
            false
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(attempt) = self.core.get_mut().attempt.take() {
            attempt.emitter.close();
            attempt.cancel.store(true, Ordering::SeqCst);
            if let Some(timer) = attempt.timer {
                timer.abort();
            }
            if let Some(worker) = attempt.worker {
                if !self.backend.consumes_frames() {
                    worker.abort();
                }
            }
            warn!("Session {} dropped while active", self.handle);
        }
    }
}

fn error_event(e: &SessionError) -> RecognitionEvent {
    match e {
        SessionError::Audio(e) => e.clone().into(),
        SessionError::Backend(e) => e.clone().into(),
        other => RecognitionEvent::error(ErrorKind::BackendFailure, other.to_string()),
    }
}

/// Host callback context: delivers events to the sink in order
async fn dispatch(
    mut events_rx: mpsc::UnboundedReceiver<Envelope>,
    sink: Arc<dyn EventSink>,
    shared: Weak<Shared>,
) {
    while let Some(envelope) = events_rx.recv().await {
        match envelope {
            Envelope::Event(event) => {
                if let Some(shared) = shared.upgrade() {
                    shared.record(&event);
                }
                sink.deliver(&event).await;
            }
            Envelope::Ended { generation, last } => {
                let Some(shared) = shared.upgrade() else { continue };
                if !shared.finish_attempt(generation).await {
                    if let Some(event) = last {
                        debug!("Dropping terminal {} of stopped attempt {}", event.label(), generation);
                    }
                    continue;
                }
                // Idle by now, so the host may start again from its callback
                if let Some(event) = last {
                    shared.record(&event);
                    drop(shared);
                    sink.deliver(&event).await;
                }
            }
            Envelope::Shutdown => break,
        }
    }
    debug!("Session dispatcher stopped");
}

fn spawn_timer(emitter: AttemptEmitter, timeout: Duration, handle: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;

        // Continuous attempts that already recognized speech just run out of time
        if emitter.recognized() {
            if emitter.end(None) {
                info!("Session {} reached its {:?} limit", handle, timeout);
            }
            return;
        }

        let event = RecognitionEvent::error(
            ErrorKind::Timeout,
            format!("no recognition result within {} ms", timeout.as_millis()),
        );
        if emitter.end(Some(event)) {
            warn!("Session {} timed out after {:?}", handle, timeout);
        }
    })
}

enum ReaderExit {
    Cancelled,
    Ended(Option<RecognitionEvent>),
}

/// Ends the attempt if the reader unwinds
struct PanicGuard<'a>(&'a AttemptEmitter);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.end(Some(RecognitionEvent::error(
                ErrorKind::BackendFailure,
                "audio reader panicked",
            )));
        }
    }
}

/// Blocking frame pump for streaming backends
fn run_reader(
    mut source: AudioFrameSource,
    backend: Arc<RecognitionBackend>,
    emitter: AttemptEmitter,
    cancel: Arc<AtomicBool>,
    read_timeout: Duration,
    continuous: bool,
) {
    let RecognitionBackend::Streaming(streaming) = &*backend else {
        emitter.end(Some(RecognitionEvent::error(
            ErrorKind::BackendFailure,
            "backend does not accept audio frames",
        )));
        return;
    };
    let _guard = PanicGuard(&emitter);

    debug!(
        "Audio reader started (attempt {}, {:?} profile)",
        emitter.generation(),
        source.profile()
    );

    let exit = loop {
        if cancel.load(Ordering::SeqCst) {
            break ReaderExit::Cancelled;
        }

        let read = source.read_frame(read_timeout);
        // Stopped while blocked in the read: the frame belongs to no attempt
        if cancel.load(Ordering::SeqCst) {
            break ReaderExit::Cancelled;
        }

        match read {
            Ok(FrameRead::Frame(frame)) => match streaming.feed(&frame) {
                Ok(Some(event @ RecognitionEvent::Final { .. })) if !continuous => {
                    break ReaderExit::Ended(Some(event));
                }
                Ok(Some(event)) => {
                    emitter.emit(event);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Decoder failed on frame {}: {}", frame.sequence, e);
                    break ReaderExit::Ended(Some(e.into()));
                }
            },
            Ok(FrameRead::Timeout) => {}
            Ok(FrameRead::EndOfStream) => {
                info!("Audio source reached end of stream");
                break ReaderExit::Ended(streaming.flush().map(RecognitionEvent::final_text));
            }
            Err(e) => {
                error!("Audio read failed: {}", e);
                break ReaderExit::Ended(Some(e.into()));
            }
        }
    };

    let frames = source.frames_read();
    source.close();

    match exit {
        ReaderExit::Cancelled => debug!("Audio reader cancelled after {} frames", frames),
        ReaderExit::Ended(last) => {
            debug!("Audio reader finished after {} frames", frames);
            emitter.end(last);
        }
    }
}

async fn run_request(backend: Arc<RecognitionBackend>, config: RecognitionConfig, emitter: AttemptEmitter) {
    let RecognitionBackend::Delegated(delegated) = &*backend else {
        emitter.end(Some(RecognitionEvent::error(
            ErrorKind::BackendFailure,
            "backend does not accept whole-utterance requests",
        )));
        return;
    };

    let partials = emitter.clone();
    let terminal = delegated
        .request_once(&config, move |event| {
            partials.emit(event);
        })
        .await;

    debug!("Request finished with {} (attempt {})", terminal.label(), emitter.generation());
    emitter.end(Some(terminal));
}
