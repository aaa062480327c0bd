use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::audio::{AudioDevice, AudioFormat, SourceProfile, DEFAULT_PROFILES};

/// How long `stop` waits for the frame reader to exit
pub const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Longest blocking read allowed. Keeps a reader stuck in one read well
/// inside `READER_JOIN_TIMEOUT`.
pub const MAX_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Events kept per session for status queries
pub const EVENT_HISTORY_LIMIT: usize = 256;

/// Audio input a streaming session captures from
#[derive(Clone)]
pub struct AudioInput {
    pub device: Arc<dyn AudioDevice>,
    pub format: AudioFormat,
    /// Tried in order when opening the device
    pub profiles: Vec<SourceProfile>,
    /// Upper bound on a single blocking read; also bounds stop latency
    pub read_timeout: Duration,
}

impl AudioInput {
    pub fn new(device: Arc<dyn AudioDevice>, format: AudioFormat) -> Self {
        Self {
            device,
            format,
            profiles: DEFAULT_PROFILES.to_vec(),
            read_timeout: Duration::from_millis(100),
        }
    }

    /// Clamped to `1ms..=MAX_READ_TIMEOUT`
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        let clamped = read_timeout.clamp(Duration::from_millis(1), MAX_READ_TIMEOUT);
        if clamped != read_timeout {
            warn!("Read timeout {:?} out of range, using {:?}", read_timeout, clamped);
        }
        self.read_timeout = clamped;
        self
    }

    pub fn with_profiles(mut self, profiles: Vec<SourceProfile>) -> Self {
        self.profiles = profiles;
        self
    }
}

/// What the registry does when a session starts while another is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Stop the active session, then start the new one
    #[default]
    Preempt,
    /// Refuse the new start
    Reject,
}
