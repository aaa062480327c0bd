use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Category carried by `RecognitionEvent::Error`, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Audio input could not be opened or read
    DeviceUnavailable,
    /// Backend has no model loaded, or was released
    NotInitialized,
    /// Model directory could not be loaded
    ModelLoad,
    /// Underlying recognizer reported a failure
    BackendFailure,
    /// No terminal result arrived before the deadline
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::NotInitialized => "not_initialized",
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::BackendFailure => "backend_failure",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Audio input errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio read failed: {0}")]
    Read(String),
}

impl AudioError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DeviceUnavailable
    }
}

/// Recognition backend errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("recognizer not initialized, load a model first")]
    NotInitialized,

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Code reported by the underlying recognizer, kept verbatim
    #[error("{0}")]
    BackendFailure(String),

    #[error("no recognition result before the deadline")]
    Timeout,

    #[error("backend is already listening")]
    Busy,

    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::NotInitialized => ErrorKind::NotInitialized,
            BackendError::ModelLoad(_) => ErrorKind::ModelLoad,
            BackendError::Timeout => ErrorKind::Timeout,
            BackendError::BackendFailure(_) | BackendError::Busy | BackendError::Unsupported(_) => {
                ErrorKind::BackendFailure
            }
        }
    }
}

/// Errors returned to the caller of session and registry operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session has been released")]
    Released,

    #[error("invalid recognition config: {0}")]
    InvalidConfig(String),

    #[error("unknown session handle {0}")]
    UnknownHandle(Uuid),

    #[error("session {0} is already active")]
    Conflict(Uuid),

    #[error("session setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
