use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::config::ConflictPolicy;
use super::session::{RecognitionSession, SessionHandle};
use super::stats::SessionStats;
use crate::error::SessionError;
use crate::recognition::RecognitionConfig;

#[derive(Default)]
struct Table {
    sessions: HashMap<SessionHandle, Arc<RecognitionSession>>,
    /// Host slot → live session
    slots: HashMap<String, SessionHandle>,
}

/// Handle table owned by the host adapter.
///
/// One session per host slot: `create` for a slot that already has a session
/// returns the existing handle. Only one session may be active at a time;
/// `start` resolves conflicts according to the configured policy.
pub struct SessionRegistry {
    table: RwLock<Table>,
    /// Held from the conflict check until the start completes
    starting: Mutex<()>,
    policy: ConflictPolicy,
}

impl SessionRegistry {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            starting: Mutex::new(()),
            policy,
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Return the slot's session, building one with `build` if there is none
    pub async fn create<F>(&self, slot: &str, build: F) -> Result<SessionHandle, SessionError>
    where
        F: FnOnce() -> Result<RecognitionSession, SessionError>,
    {
        let mut table = self.table.write().await;
        if let Some(handle) = table.slots.get(slot) {
            info!("Slot '{}' already has session {}", slot, handle);
            return Ok(*handle);
        }

        let session = build()?;
        let handle = session.handle();
        table.slots.insert(slot.to_string(), handle);
        table.sessions.insert(handle, Arc::new(session));

        info!("Registered session {} for slot '{}'", handle, slot);
        Ok(handle)
    }

    pub async fn get(&self, handle: SessionHandle) -> Result<Arc<RecognitionSession>, SessionError> {
        let table = self.table.read().await;
        table
            .sessions
            .get(&handle)
            .cloned()
            .ok_or(SessionError::UnknownHandle(handle))
    }

    pub async fn handle_for_slot(&self, slot: &str) -> Option<SessionHandle> {
        self.table.read().await.slots.get(slot).copied()
    }

    pub async fn load_model(&self, handle: SessionHandle, path: impl Into<PathBuf>) -> Result<(), SessionError> {
        self.get(handle).await?.load_model(path).await
    }

    /// Start a session, applying the conflict policy to other active sessions
    pub async fn start(&self, handle: SessionHandle, config: RecognitionConfig) -> Result<(), SessionError> {
        let session = self.get(handle).await?;
        let _starting = self.starting.lock().await;

        let active: Vec<Arc<RecognitionSession>> = {
            let table = self.table.read().await;
            table
                .sessions
                .values()
                .filter(|s| s.handle() != handle && s.state().is_active())
                .cloned()
                .collect()
        };

        match self.policy {
            ConflictPolicy::Preempt => {
                for other in active {
                    info!("Stopping session {} to start {}", other.handle(), handle);
                    other.stop().await;
                }
            }
            ConflictPolicy::Reject => {
                if let Some(other) = active.first() {
                    warn!("Rejecting start of {}: {} is active", handle, other.handle());
                    return Err(SessionError::Conflict(other.handle()));
                }
            }
        }

        session.start(config).await
    }

    pub async fn stop(&self, handle: SessionHandle) -> Result<(), SessionError> {
        self.get(handle).await?.stop().await;
        Ok(())
    }

    /// Release a session and forget its handle
    pub async fn release(&self, handle: SessionHandle) -> Result<(), SessionError> {
        let session = {
            let mut table = self.table.write().await;
            let session = table
                .sessions
                .remove(&handle)
                .ok_or(SessionError::UnknownHandle(handle))?;
            table.slots.retain(|_, h| *h != handle);
            session
        };

        session.release().await;
        Ok(())
    }

    pub async fn stats(&self, handle: SessionHandle) -> Result<SessionStats, SessionError> {
        Ok(self.get(handle).await?.stats().await)
    }

    pub async fn list(&self) -> Vec<SessionStats> {
        let sessions: Vec<Arc<RecognitionSession>> =
            self.table.read().await.sessions.values().cloned().collect();

        let mut stats = Vec::with_capacity(sessions.len());
        for session in sessions {
            stats.push(session.stats().await);
        }
        stats
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Release every session
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<RecognitionSession>> = {
            let mut table = self.table.write().await;
            table.slots.clear();
            table.sessions.drain().map(|(_, s)| s).collect()
        };

        info!("Shutting down {} session(s)", sessions.len());
        for session in sessions {
            session.release().await;
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ConflictPolicy::default())
    }
}
