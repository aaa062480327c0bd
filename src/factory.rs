use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::audio::{AudioDevice, WavFileDevice};
use crate::config::{Config, InputKind};
use crate::error::SessionError;
use crate::nats::{NatsClient, NatsEventSink, NatsSpeechService};
use crate::recognition::{BackendKind, DelegatedBackend, ModelLoader, StreamingBackend};
use crate::session::{AudioInput, EventSink, LogSink, RecognitionSession};

/// Builds sessions for the host adapter
pub trait SessionFactory: Send + Sync {
    fn build(&self, slot: &str, kind: BackendKind) -> Result<RecognitionSession, SessionError>;

    /// Model loaded into new streaming sessions, if any
    fn default_model(&self) -> Option<PathBuf> {
        None
    }
}

/// Session factory driven by the service configuration
pub struct ConfiguredFactory {
    config: Config,
    nats: Option<Arc<NatsClient>>,
    loader: Option<Arc<dyn ModelLoader>>,
}

impl ConfiguredFactory {
    pub fn new(config: Config, nats: Option<Arc<NatsClient>>) -> Self {
        Self {
            config,
            nats,
            loader: default_loader(),
        }
    }

    /// Replace the model loader used by streaming sessions
    pub fn with_model_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Build a session that reports to `sink` instead of the configured sink
    pub fn build_with_sink(
        &self,
        slot: &str,
        kind: BackendKind,
        sink: Arc<dyn EventSink>,
    ) -> Result<RecognitionSession, SessionError> {
        match kind {
            BackendKind::Streaming => {
                let loader = self.loader.clone().ok_or_else(|| {
                    SessionError::Setup("streaming backend requires the `vosk` feature".into())
                })?;
                let format = self.config.audio.format();
                let input = AudioInput::new(self.device()?, format).with_read_timeout(self.config.audio.read_timeout());

                info!("Building streaming session for slot '{}' ({})", slot, loader.name());
                let backend = StreamingBackend::new(loader, format.sample_rate);
                Ok(RecognitionSession::new(slot, backend.into(), Some(input), sink))
            }
            BackendKind::Delegated => {
                let client = self.nats.clone().ok_or_else(|| {
                    SessionError::Setup("delegated backend requires a NATS connection".into())
                })?;

                let backend = DelegatedBackend::new(Arc::new(NatsSpeechService::new(client)));
                info!("Building delegated session for slot '{}' ({})", slot, backend.service_name());
                Ok(RecognitionSession::new(slot, backend.into(), None, sink))
            }
        }
    }

    fn device(&self) -> Result<Arc<dyn AudioDevice>, SessionError> {
        let audio = &self.config.audio;
        match audio.input {
            InputKind::File => {
                let path = audio
                    .file_path
                    .clone()
                    .ok_or_else(|| SessionError::Setup("audio.file_path is not set".into()))?;
                Ok(Arc::new(WavFileDevice::new(path).realtime(audio.realtime)))
            }
            InputKind::Microphone => microphone(audio.preferred_device.clone()),
        }
    }

    fn sink(&self, slot: &str) -> Arc<dyn EventSink> {
        match &self.nats {
            Some(client) => Arc::new(NatsEventSink::new(Arc::clone(client), slot)),
            None => Arc::new(LogSink::new(slot)),
        }
    }
}

impl SessionFactory for ConfiguredFactory {
    fn build(&self, slot: &str, kind: BackendKind) -> Result<RecognitionSession, SessionError> {
        self.build_with_sink(slot, kind, self.sink(slot))
    }

    fn default_model(&self) -> Option<PathBuf> {
        self.config.model.path.clone()
    }
}

#[cfg(feature = "vosk")]
fn default_loader() -> Option<Arc<dyn ModelLoader>> {
    Some(Arc::new(crate::recognition::vosk::VoskLoader))
}

#[cfg(not(feature = "vosk"))]
fn default_loader() -> Option<Arc<dyn ModelLoader>> {
    None
}

#[cfg(feature = "microphone")]
fn microphone(preferred_device: Option<String>) -> Result<Arc<dyn AudioDevice>, SessionError> {
    Ok(Arc::new(crate::audio::MicrophoneDevice::new(preferred_device)))
}

#[cfg(not(feature = "microphone"))]
fn microphone(_preferred_device: Option<String>) -> Result<Arc<dyn AudioDevice>, SessionError> {
    Err(SessionError::Setup(
        "microphone input requires the `microphone` feature".into(),
    ))
}
