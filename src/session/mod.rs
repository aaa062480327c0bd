//! Recognition session management
//!
//! This module provides the `RecognitionSession` abstraction that manages:
//! - The start/stop/timeout lifecycle of a recognition attempt
//! - Audio frame pumping for streaming backends
//! - Ordered event delivery to the host sink
//! - The handle table (`SessionRegistry`) owned by the host adapter

mod config;
mod emitter;
mod registry;
mod session;
mod sink;
mod state;
mod stats;

pub use config::{AudioInput, ConflictPolicy, EVENT_HISTORY_LIMIT, MAX_READ_TIMEOUT, READER_JOIN_TIMEOUT};
pub use registry::SessionRegistry;
pub use session::{RecognitionSession, SessionHandle};
pub use sink::{ChannelSink, EventSink, LogSink};
pub use state::SessionState;
pub use stats::{EventRecord, SessionStats};
