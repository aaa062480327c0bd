use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::config::RecognitionConfig;
use super::event::RecognitionEvent;
use crate::error::{BackendError, ErrorKind};

/// One whole-utterance request handed to a speech service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionRequest {
    pub request_id: Uuid,
    pub language: Option<String>,
    pub max_results: u8,
    pub partial_results: bool,
    pub prefer_offline: bool,
    pub min_speech_length_ms: Option<u64>,
    pub complete_silence_ms: Option<u64>,
    pub possibly_complete_silence_ms: Option<u64>,
}

impl RecognitionRequest {
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            language: config.language.clone(),
            max_results: config.max_results,
            partial_results: config.partial_results,
            prefer_offline: config.prefer_offline,
            min_speech_length_ms: config.min_speech_length_ms,
            complete_silence_ms: config.complete_silence_ms,
            possibly_complete_silence_ms: config.possibly_complete_silence_ms,
        }
    }
}

/// External recognition service that owns its own audio capture.
///
/// After `start_listening` the service sends zero or more Partial events and
/// then one Final or Error on `events`. Error codes are passed through as the
/// message of an `ErrorKind::BackendFailure` event.
#[async_trait]
pub trait SpeechService: Send + Sync {
    fn name(&self) -> &str;

    async fn start_listening(
        &self,
        request: RecognitionRequest,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<(), BackendError>;

    async fn stop_listening(&self) -> Result<(), BackendError>;

    async fn destroy(&self) -> Result<(), BackendError> {
        self.stop_listening().await
    }
}

/// Delegated variant: a single request per attempt, guarded by a safety timeout
pub struct DelegatedBackend {
    service: Arc<dyn SpeechService>,
    active: AtomicBool,
    released: AtomicBool,
}

impl DelegatedBackend {
    pub fn new(service: Arc<dyn SpeechService>) -> Self {
        Self {
            service,
            active: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn start(&self, _config: &RecognitionConfig) -> Result<(), BackendError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(BackendError::NotInitialized);
        }
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(BackendError::Busy);
        }
        Ok(())
    }

    /// Issue one request and wait for its terminal event.
    ///
    /// Partials are handed to `on_partial` as they arrive. If nothing terminal
    /// arrives within `config.effective_timeout()`, the service is stopped and
    /// a Timeout error is returned instead.
    pub async fn request_once<F>(&self, config: &RecognitionConfig, mut on_partial: F) -> RecognitionEvent
    where
        F: FnMut(RecognitionEvent) + Send,
    {
        if self.released.load(Ordering::SeqCst) {
            return BackendError::NotInitialized.into();
        }

        let request = RecognitionRequest::from_config(config);
        let request_id = request.request_id;
        let (tx, mut rx) = mpsc::channel(32);

        info!("Requesting recognition from {} ({})", self.service.name(), request_id);
        if let Err(e) = self.service.start_listening(request, tx).await {
            warn!("{} failed to start listening: {}", self.service.name(), e);
            self.active.store(false, Ordering::SeqCst);
            return e.into();
        }

        let timeout = config.effective_timeout();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!("No result from {} within {:?}, stopping", self.service.name(), timeout);
                    if let Err(e) = self.service.stop_listening().await {
                        warn!("Stop after timeout failed: {}", e);
                    }
                    break RecognitionEvent::error(
                        ErrorKind::Timeout,
                        format!("no recognition result within {} ms", timeout.as_millis()),
                    );
                }
                event = rx.recv() => match event {
                    Some(event @ RecognitionEvent::Partial { .. }) => on_partial(event),
                    Some(terminal) => break terminal,
                    None => {
                        break RecognitionEvent::error(
                            ErrorKind::BackendFailure,
                            "speech service closed without a result",
                        )
                    }
                },
            }
        };

        self.active.store(false, Ordering::SeqCst);
        outcome
    }

    /// Cancel any request in flight
    pub async fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.service.stop_listening().await {
                warn!("{} stop_listening failed: {}", self.service.name(), e);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn release(&self) {
        self.stop().await;
        if !self.released.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.service.destroy().await {
                warn!("{} destroy failed: {}", self.service.name(), e);
            }
            info!("Speech service {} released", self.service.name());
        }
    }
}
