use async_trait::async_trait;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::NatsClient;
use super::messages::{
    RequestMessage, ServiceErrorMessage, StopMessage, TranscriptMessage, ERROR_SUBJECT, REQUEST_SUBJECT,
    STOP_SUBJECT, TRANSCRIPT_SUBJECT,
};
use crate::error::BackendError;
use crate::recognition::{RecognitionEvent, RecognitionRequest, SpeechService};

struct ActiveRequest {
    request_id: Uuid,
    forwarder: JoinHandle<()>,
    /// Set once the service's terminal reply was relayed
    answered: Arc<AtomicBool>,
}

impl ActiveRequest {
    /// The service only needs a stop for a request it has not answered
    fn needs_stop(&self) -> bool {
        !self.answered.load(Ordering::SeqCst)
    }
}

/// Speech service reached over NATS.
///
/// Publishes the request on `stt.request` and relays replies from
/// `stt.text.>` and `stt.error` that carry the same `request_id`.
pub struct NatsSpeechService {
    client: Arc<NatsClient>,
    active: Mutex<Option<ActiveRequest>>,
}

impl NatsSpeechService {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self {
            client,
            active: Mutex::new(None),
        }
    }

    async fn cancel(&self, request: ActiveRequest) {
        request.forwarder.abort();
        if !request.needs_stop() {
            debug!("Request {} already answered, no stop needed", request.request_id);
            return;
        }
        if let Err(e) = self
            .client
            .publish_json(STOP_SUBJECT, &StopMessage::new(request.request_id))
            .await
        {
            warn!("Failed to publish stop for {}: {}", request.request_id, e);
        }
    }
}

#[async_trait]
impl SpeechService for NatsSpeechService {
    fn name(&self) -> &str {
        "nats"
    }

    async fn start_listening(
        &self,
        request: RecognitionRequest,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<(), BackendError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            if previous.needs_stop() {
                warn!("Cancelling unanswered request {}", previous.request_id);
            }
            self.cancel(previous).await;
        }

        // Subscribe before publishing so no reply is missed
        let transcripts = self
            .client
            .subscribe(TRANSCRIPT_SUBJECT)
            .await
            .map_err(|e| BackendError::BackendFailure(format!("{:#}", e)))?;
        let errors = self
            .client
            .subscribe(ERROR_SUBJECT)
            .await
            .map_err(|e| BackendError::BackendFailure(format!("{:#}", e)))?;

        let request_id = request.request_id;
        self.client
            .publish_json(REQUEST_SUBJECT, &RequestMessage::new(request))
            .await
            .map_err(|e| BackendError::BackendFailure(format!("{:#}", e)))?;

        info!("Published recognition request {}", request_id);

        let answered = Arc::new(AtomicBool::new(false));
        let forwarder = tokio::spawn(forward_replies(
            request_id,
            transcripts,
            errors,
            events,
            Arc::clone(&answered),
        ));
        *active = Some(ActiveRequest {
            request_id,
            forwarder,
            answered,
        });
        Ok(())
    }

    async fn stop_listening(&self) -> Result<(), BackendError> {
        let request = self.active.lock().await.take();
        if let Some(request) = request {
            info!("Stopping recognition request {}", request.request_id);
            self.cancel(request).await;
        }
        Ok(())
    }
}

fn parse_transcript(payload: &[u8], request_id: Uuid) -> Option<RecognitionEvent> {
    match serde_json::from_slice::<TranscriptMessage>(payload) {
        Ok(transcript) if transcript.request_id == request_id => Some(transcript.into_event()),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse transcript message: {}", e);
            None
        }
    }
}

fn parse_error(payload: &[u8], request_id: Uuid) -> Option<RecognitionEvent> {
    match serde_json::from_slice::<ServiceErrorMessage>(payload) {
        Ok(error) if error.request_id == request_id => Some(error.into_event()),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse service error message: {}", e);
            None
        }
    }
}

async fn forward_replies(
    request_id: Uuid,
    mut transcripts: async_nats::Subscriber,
    mut errors: async_nats::Subscriber,
    events: mpsc::Sender<RecognitionEvent>,
    answered: Arc<AtomicBool>,
) {
    loop {
        let reply = tokio::select! {
            msg = transcripts.next() => msg.map(|m| parse_transcript(&m.payload, request_id)),
            msg = errors.next() => msg.map(|m| parse_error(&m.payload, request_id)),
        };

        // A closed subscription ends the request; the backend reports it
        let Some(parsed) = reply else { break };
        let Some(event) = parsed else { continue };

        let terminal = !event.is_partial();
        if terminal {
            answered.store(true, Ordering::SeqCst);
        }
        if events.send(event).await.is_err() || terminal {
            break;
        }
    }
}
