use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::config::RecognitionConfig;
use super::event::RecognitionEvent;
use crate::audio::AudioFrame;
use crate::error::BackendError;

/// Decoder progress after accepting a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingState {
    /// Utterance boundary detected, `result()` holds the final text
    Finalized,
    /// Still decoding, `partial_result()` holds the current hypothesis
    Running,
}

/// A local streaming decoder bound to a loaded model
pub trait Decoder: Send {
    fn accept_waveform(&mut self, samples: &[i16]) -> Result<DecodingState, BackendError>;

    /// Current hypothesis for the utterance in progress
    fn partial_result(&mut self) -> String;

    /// Text of the utterance that just finalized
    fn result(&mut self) -> String;

    /// Flush whatever is buffered at end of input
    fn final_result(&mut self) -> String;

    /// Forget the current utterance
    fn reset(&mut self);
}

/// Builds decoders from a model directory
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Box<dyn Decoder>, BackendError>;

    fn name(&self) -> &str;
}

struct StreamingState {
    model_path: Option<PathBuf>,
    decoder: Option<Box<dyn Decoder>>,
    active: bool,
    last_partial: String,
}

/// Streaming variant: consumes raw frames and emits partial/final events.
///
/// The first successful `load_model` wins; later calls are no-ops until
/// `release` drops the model. After each Final the decoder is reset so the
/// next utterance starts clean.
pub struct StreamingBackend {
    loader: Arc<dyn ModelLoader>,
    sample_rate: u32,
    state: Mutex<StreamingState>,
}

impl StreamingBackend {
    pub fn new(loader: Arc<dyn ModelLoader>, sample_rate: u32) -> Self {
        Self {
            loader,
            sample_rate,
            state: Mutex::new(StreamingState {
                model_path: None,
                decoder: None,
                active: false,
                last_partial: String::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the model directory at `path`
    pub fn load_model(&self, path: impl AsRef<Path>) -> Result<(), BackendError> {
        let path = path.as_ref();
        let mut state = self.lock();

        if let Some(loaded) = &state.model_path {
            debug!("Model already loaded from {}, ignoring {}", loaded.display(), path.display());
            return Ok(());
        }

        if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
            return Err(BackendError::ModelLoad("model path is empty".into()));
        }
        if !path.exists() {
            return Err(BackendError::ModelLoad(format!("model path not found: {}", path.display())));
        }
        if !path.is_dir() {
            return Err(BackendError::ModelLoad(format!(
                "model path is not a directory: {}",
                path.display()
            )));
        }

        let decoder = self.loader.load(path, self.sample_rate)?;
        state.decoder = Some(decoder);
        state.model_path = Some(path.to_path_buf());

        info!("Model loaded via {}: {}", self.loader.name(), path.display());
        Ok(())
    }

    pub fn is_model_loaded(&self) -> bool {
        self.lock().decoder.is_some()
    }

    pub fn model_path(&self) -> Option<PathBuf> {
        self.lock().model_path.clone()
    }

    pub fn start(&self, _config: &RecognitionConfig) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.active {
            return Err(BackendError::Busy);
        }
        let decoder = state.decoder.as_mut().ok_or(BackendError::NotInitialized)?;
        decoder.reset();
        state.last_partial.clear();
        state.active = true;
        Ok(())
    }

    /// Feed one frame. `None` means nothing new to report.
    pub fn feed(&self, frame: &AudioFrame) -> Result<Option<RecognitionEvent>, BackendError> {
        let mut state = self.lock();
        if !state.active {
            return Ok(None);
        }
        let StreamingState {
            decoder, last_partial, ..
        } = &mut *state;
        let decoder = decoder.as_mut().ok_or(BackendError::NotInitialized)?;

        match decoder.accept_waveform(&frame.samples)? {
            DecodingState::Finalized => {
                let text = decoder.result();
                decoder.reset();
                last_partial.clear();
                Ok(Some(RecognitionEvent::final_text(text)))
            }
            DecodingState::Running => {
                let text = decoder.partial_result();
                if text == *last_partial {
                    return Ok(None);
                }
                *last_partial = text.clone();
                Ok(Some(RecognitionEvent::partial(text)))
            }
        }
    }

    /// Final text buffered at end of input, if any
    pub fn flush(&self) -> Option<String> {
        let mut state = self.lock();
        if !state.active {
            return None;
        }
        let decoder = state.decoder.as_mut()?;
        let text = decoder.final_result();
        decoder.reset();
        state.last_partial.clear();
        (!text.trim().is_empty()).then_some(text)
    }

    pub fn stop(&self) {
        let mut state = self.lock();
        if state.active {
            state.active = false;
            if let Some(decoder) = state.decoder.as_mut() {
                decoder.reset();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Drop the decoder and model; a new `load_model` is required afterwards
    pub fn release(&self) {
        let mut state = self.lock();
        state.active = false;
        state.last_partial.clear();
        if state.decoder.take().is_some() {
            info!("Model released");
        } else {
            warn!("Release called with no model loaded");
        }
        state.model_path = None;
    }
}
