use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::config::RecognitionConfig;
use super::delegated::DelegatedBackend;
use super::streaming::StreamingBackend;
use crate::error::BackendError;

/// Which recognizer family a backend belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local decoder fed with raw frames
    Streaming,
    /// External service running whole-utterance requests
    Delegated,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Streaming => f.write_str("streaming"),
            BackendKind::Delegated => f.write_str("delegated"),
        }
    }
}

/// A recognizer the session drives uniformly.
///
/// `Streaming` consumes frames from an audio source; `Delegated` hands the
/// whole request to a service that captures audio itself.
pub enum RecognitionBackend {
    Streaming(StreamingBackend),
    Delegated(DelegatedBackend),
}

impl RecognitionBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            RecognitionBackend::Streaming(_) => BackendKind::Streaming,
            RecognitionBackend::Delegated(_) => BackendKind::Delegated,
        }
    }

    /// Whether the session must pump audio frames into this backend
    pub fn consumes_frames(&self) -> bool {
        matches!(self, RecognitionBackend::Streaming(_))
    }

    pub fn load_model(&self, path: &Path) -> Result<(), BackendError> {
        match self {
            RecognitionBackend::Streaming(backend) => backend.load_model(path),
            RecognitionBackend::Delegated(_) => Err(BackendError::Unsupported("loading a model")),
        }
    }

    pub fn start(&self, config: &RecognitionConfig) -> Result<(), BackendError> {
        match self {
            RecognitionBackend::Streaming(backend) => backend.start(config),
            RecognitionBackend::Delegated(backend) => backend.start(config),
        }
    }

    pub async fn stop(&self) {
        match self {
            RecognitionBackend::Streaming(backend) => backend.stop(),
            RecognitionBackend::Delegated(backend) => backend.stop().await,
        }
    }

    pub async fn release(&self) {
        match self {
            RecognitionBackend::Streaming(backend) => backend.release(),
            RecognitionBackend::Delegated(backend) => backend.release().await,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            RecognitionBackend::Streaming(backend) => backend.is_active(),
            RecognitionBackend::Delegated(backend) => backend.is_active(),
        }
    }
}

impl From<StreamingBackend> for RecognitionBackend {
    fn from(backend: StreamingBackend) -> Self {
        RecognitionBackend::Streaming(backend)
    }
}

impl From<DelegatedBackend> for RecognitionBackend {
    fn from(backend: DelegatedBackend) -> Self {
        RecognitionBackend::Delegated(backend)
    }
}
