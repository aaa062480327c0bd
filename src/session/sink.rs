use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::recognition::RecognitionEvent;

/// Host-side receiver of session notifications.
///
/// Called only from the session's dispatcher task, one event at a time,
/// in the order the backend produced them.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_partial(&self, text: &str);

    async fn on_final(&self, text: &str);

    async fn on_error(&self, kind: ErrorKind, message: &str);

    async fn deliver(&self, event: &RecognitionEvent) {
        match event {
            RecognitionEvent::Partial { text } => self.on_partial(text).await,
            RecognitionEvent::Final { text } => self.on_final(text).await,
            RecognitionEvent::Error { kind, message } => self.on_error(*kind, message).await,
        }
    }
}

/// Forwards every event into an unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RecognitionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: RecognitionEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event receiver dropped, discarding event");
        }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn on_partial(&self, text: &str) {
        self.forward(RecognitionEvent::partial(text));
    }

    async fn on_final(&self, text: &str) {
        self.forward(RecognitionEvent::final_text(text));
    }

    async fn on_error(&self, kind: ErrorKind, message: &str) {
        self.forward(RecognitionEvent::error(kind, message));
    }
}

/// Writes events to the log, tagged with the host slot
pub struct LogSink {
    slot: String,
}

impl LogSink {
    pub fn new(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }
}

#[async_trait]
impl EventSink for LogSink {
    async fn on_partial(&self, text: &str) {
        info!("[{}] partial: {}", self.slot, text);
    }

    async fn on_final(&self, text: &str) {
        info!("[{}] final: {}", self.slot, text);
    }

    async fn on_error(&self, kind: ErrorKind, message: &str) {
        warn!("[{}] error ({}): {}", self.slot, kind, message);
    }
}
