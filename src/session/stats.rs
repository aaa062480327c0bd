use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use super::state::SessionState;
use crate::recognition::{BackendKind, RecognitionEvent};

/// Snapshot of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub handle: Uuid,

    /// Host slot the session was created for
    pub slot: String,

    pub backend: BackendKind,

    pub state: SessionState,

    pub created_at: DateTime<Utc>,

    /// When the latest attempt started
    pub last_started_at: Option<DateTime<Utc>>,

    /// Number of accepted `start` calls
    pub attempts: usize,

    pub partials: usize,
    pub finals: usize,
    pub errors: usize,
}

/// A delivered event with its delivery time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: RecognitionEvent,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct SessionCounters {
    pub(crate) attempts: AtomicUsize,
    pub(crate) partials: AtomicUsize,
    pub(crate) finals: AtomicUsize,
    pub(crate) errors: AtomicUsize,
}

impl SessionCounters {
    pub(crate) fn record(&self, event: &RecognitionEvent) {
        let counter = match event {
            RecognitionEvent::Partial { .. } => &self.partials,
            RecognitionEvent::Final { .. } => &self.finals,
            RecognitionEvent::Error { .. } => &self.errors,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}
