use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::recognition::{RecognitionEvent, RecognitionRequest};

/// Subject a delegated request is published on
pub const REQUEST_SUBJECT: &str = "stt.request";
/// Subject used to cancel a request in flight
pub const STOP_SUBJECT: &str = "stt.stop";
/// Partial and final transcripts (stt.text.partial, stt.text.final)
pub const TRANSCRIPT_SUBJECT: &str = "stt.text.>";
/// Service-side failures
pub const ERROR_SUBJECT: &str = "stt.error";

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Recognition request published to the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct RequestMessage {
    #[serde(flatten)]
    pub request: RecognitionRequest,
    pub timestamp: String, // RFC3339 timestamp
}

impl RequestMessage {
    pub fn new(request: RecognitionRequest) -> Self {
        Self {
            request,
            timestamp: now_rfc3339(),
        }
    }
}

/// Cancels the request with `request_id`
#[derive(Debug, Serialize, Deserialize)]
pub struct StopMessage {
    pub request_id: Uuid,
    pub timestamp: String,
}

impl StopMessage {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            timestamp: now_rfc3339(),
        }
    }
}

/// Transcript message received from STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub request_id: Uuid,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Ranked hypotheses, best first
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl TranscriptMessage {
    /// Best hypothesis: the first alternative if any, otherwise `text`
    pub fn best_text(&self) -> &str {
        self.alternatives.first().map(String::as_str).unwrap_or(&self.text)
    }

    pub fn into_event(self) -> RecognitionEvent {
        let text = self.best_text().to_string();
        if self.partial {
            RecognitionEvent::partial(text)
        } else {
            RecognitionEvent::final_text(text)
        }
    }
}

/// Failure reported by the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceErrorMessage {
    pub request_id: Uuid,
    /// Service error code, passed to the host verbatim
    pub code: String,
    pub timestamp: String,
}

impl ServiceErrorMessage {
    pub fn into_event(self) -> RecognitionEvent {
        RecognitionEvent::error(ErrorKind::BackendFailure, self.code)
    }
}

/// Session notification published for the host
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionEventMessage {
    pub slot: String,
    #[serde(flatten)]
    pub event: RecognitionEvent,
    pub timestamp: String,
}

impl SessionEventMessage {
    pub fn new(slot: impl Into<String>, event: RecognitionEvent) -> Self {
        Self {
            slot: slot.into(),
            event,
            timestamp: now_rfc3339(),
        }
    }

    /// speech.<slot>.<partial|final|error>
    pub fn subject(&self) -> String {
        format!("speech.{}.{}", self.slot, self.event.label())
    }
}
