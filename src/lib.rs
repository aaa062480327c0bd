pub mod audio;
pub mod config;
pub mod error;
pub mod factory;
pub mod http;
pub mod nats;
pub mod recognition;
pub mod session;

pub use audio::{AudioDevice, AudioFile, AudioFormat, AudioFrame, AudioFrameSource, FrameRead, WavFileDevice};
pub use config::Config;
pub use error::{AudioError, BackendError, ErrorKind, SessionError};
pub use factory::{ConfiguredFactory, SessionFactory};
pub use http::{create_router, AppState};
pub use nats::{NatsClient, NatsEventSink, NatsSpeechService};
pub use recognition::{
    BackendKind, DelegatedBackend, RecognitionBackend, RecognitionConfig, RecognitionEvent, SpeechService,
    StreamingBackend,
};
pub use session::{
    ConflictPolicy, EventSink, RecognitionSession, SessionHandle, SessionRegistry, SessionState, SessionStats,
};
