//! Recognition backends
//!
//! Two variants behind one `RecognitionBackend`:
//! - `StreamingBackend`: local decoder fed with PCM frames (Vosk)
//! - `DelegatedBackend`: external service handling whole utterances

mod backend;
mod config;
mod delegated;
mod event;
mod streaming;

#[cfg(feature = "vosk")]
pub mod vosk;

pub use backend::{BackendKind, RecognitionBackend};
pub use config::{RecognitionConfig, TIMEOUT_FLOOR};
pub use delegated::{DelegatedBackend, RecognitionRequest, SpeechService};
pub use event::RecognitionEvent;
pub use streaming::{Decoder, DecodingState, ModelLoader, StreamingBackend};
