use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a recognition session
///
/// `Idle → Starting → Listening → Stopping → Idle`; `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Starting,
    Listening,
    Stopping,
    Released,
}

impl SessionState {
    /// Holds (or is acquiring) the audio device and backend
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Listening | SessionState::Stopping
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Listening => "listening",
            SessionState::Stopping => "stopping",
            SessionState::Released => "released",
        };
        f.write_str(name)
    }
}
