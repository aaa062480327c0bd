use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

use crate::recognition::RecognitionEvent;

/// Messages consumed by the session dispatcher
pub(crate) enum Envelope {
    Event(RecognitionEvent),
    /// The attempt with this generation is over. `last` reaches the sink
    /// only after the session is idle again.
    Ended {
        generation: u64,
        last: Option<RecognitionEvent>,
    },
    Shutdown,
}

/// Event producer handle for one start/stop attempt.
///
/// Shared by the reader, the request task and the timer. The first `end` or
/// `close` wins; everything sent afterwards is dropped, so an attempt delivers
/// at most one terminal event and nothing after it.
#[derive(Clone)]
pub(crate) struct AttemptEmitter {
    generation: u64,
    tx: mpsc::UnboundedSender<Envelope>,
    closed: Arc<Mutex<bool>>,
    recognized: Arc<AtomicBool>,
}

impl AttemptEmitter {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            generation,
            tx,
            closed: Arc::new(Mutex::new(false)),
            recognized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Send a non-terminal event
    pub(crate) fn emit(&self, event: RecognitionEvent) -> bool {
        let closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            debug!("Dropping {} event from closed attempt {}", event.label(), self.generation);
            return false;
        }
        if matches!(event, RecognitionEvent::Final { .. }) {
            self.recognized.store(true, Ordering::SeqCst);
        }
        self.tx.send(Envelope::Event(event)).is_ok()
    }

    /// Whether a Final was emitted during this attempt
    pub(crate) fn recognized(&self) -> bool {
        self.recognized.load(Ordering::SeqCst)
    }

    /// Finish the attempt, optionally with a terminal event.
    ///
    /// Returns false if the attempt was already finished or stopped.
    pub(crate) fn end(&self, last: Option<RecognitionEvent>) -> bool {
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            if let Some(event) = last {
                debug!("Dropping terminal {} from closed attempt {}", event.label(), self.generation);
            }
            return false;
        }
        *closed = true;
        let _ = self.tx.send(Envelope::Ended {
            generation: self.generation,
            last,
        });
        true
    }

    /// Silence the attempt without a terminal event (host-initiated stop)
    pub(crate) fn close(&self) -> bool {
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        let was_open = !*closed;
        *closed = true;
        was_open
    }
}
