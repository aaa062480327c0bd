use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SessionError;

/// Shortest safety timeout applied to any attempt
pub const TIMEOUT_FLOOR: Duration = Duration::from_millis(1500);

/// Parameters of one recognition attempt. Fixed once the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP-47 language tag (e.g. "en-US"); backend default when unset
    pub language: Option<String>,

    /// Upper bound on one attempt, in seconds
    pub max_duration_secs: u32,

    /// Minimum speech length before the endpointer may fire
    pub min_speech_length_ms: Option<u64>,

    /// Silence after which an utterance is considered complete
    pub complete_silence_ms: Option<u64>,

    /// Silence after which an utterance is possibly complete
    pub possibly_complete_silence_ms: Option<u64>,

    /// Prefer on-device recognition when the backend supports both
    pub prefer_offline: bool,

    /// Alternatives requested from delegated services
    pub max_results: u8,

    /// Whether interim results should be produced
    pub partial_results: bool,

    /// Streaming backends keep listening after a Final result
    pub continuous: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: None,
            max_duration_secs: 6,
            min_speech_length_ms: Some(1200),
            complete_silence_ms: Some(800),
            possibly_complete_silence_ms: Some(500),
            prefer_offline: false,
            max_results: 3,
            partial_results: true,
            continuous: true,
        }
    }
}

impl RecognitionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_duration_secs == 0 {
            return Err(SessionError::InvalidConfig("max_duration_secs must be greater than 0".into()));
        }
        if self.max_results == 0 {
            return Err(SessionError::InvalidConfig("max_results must be greater than 0".into()));
        }
        if let Some(language) = &self.language {
            if language.trim().is_empty() {
                return Err(SessionError::InvalidConfig("language must not be empty when set".into()));
            }
        }
        Ok(())
    }

    /// Safety timeout for an attempt: the configured duration, never below the floor
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs as u64).max(TIMEOUT_FLOOR)
    }
}
