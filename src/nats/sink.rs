use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

use super::client::NatsClient;
use super::messages::SessionEventMessage;
use crate::error::ErrorKind;
use crate::recognition::RecognitionEvent;
use crate::session::EventSink;

/// Publishes session events on `speech.<slot>.<partial|final|error>`
pub struct NatsEventSink {
    client: Arc<NatsClient>,
    slot: String,
}

impl NatsEventSink {
    pub fn new(client: Arc<NatsClient>, slot: impl Into<String>) -> Self {
        Self {
            client,
            slot: slot.into(),
        }
    }

    async fn publish(&self, event: RecognitionEvent) {
        let message = SessionEventMessage::new(self.slot.clone(), event);
        if let Err(e) = self.client.publish_json(&message.subject(), &message).await {
            error!("Failed to publish session event: {:#}", e);
        }
    }
}

#[async_trait]
impl EventSink for NatsEventSink {
    async fn on_partial(&self, text: &str) {
        self.publish(RecognitionEvent::partial(text)).await;
    }

    async fn on_final(&self, text: &str) {
        self.publish(RecognitionEvent::final_text(text)).await;
    }

    async fn on_error(&self, kind: ErrorKind, message: &str) {
        self.publish(RecognitionEvent::error(kind, message)).await;
    }
}
