use serde::{Deserialize, Serialize};

use crate::error::{AudioError, BackendError, ErrorKind};

/// Result notification produced by a backend and relayed to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// Interim hypothesis, may be revised
    Partial { text: String },
    /// Utterance boundary reached
    Final { text: String },
    Error { kind: ErrorKind, message: String },
}

impl RecognitionEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        RecognitionEvent::Partial { text: text.into() }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        RecognitionEvent::Final { text: text.into() }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        RecognitionEvent::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, RecognitionEvent::Partial { .. })
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RecognitionEvent::Final { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RecognitionEvent::Error { .. })
    }

    /// Label used for logging and NATS subjects
    pub fn label(&self) -> &'static str {
        match self {
            RecognitionEvent::Partial { .. } => "partial",
            RecognitionEvent::Final { .. } => "final",
            RecognitionEvent::Error { .. } => "error",
        }
    }
}

impl From<BackendError> for RecognitionEvent {
    fn from(e: BackendError) -> Self {
        RecognitionEvent::error(e.kind(), e.to_string())
    }
}

impl From<AudioError> for RecognitionEvent {
    fn from(e: AudioError) -> Self {
        RecognitionEvent::error(e.kind(), e.to_string())
    }
}
