pub mod client;
pub mod messages;
pub mod service;
pub mod sink;

pub use client::NatsClient;
pub use messages::{RequestMessage, ServiceErrorMessage, SessionEventMessage, StopMessage, TranscriptMessage};
pub use service::NatsSpeechService;
pub use sink::NatsEventSink;
