// Vosk offline recognizer adapter

use std::path::Path;

use super::streaming::{Decoder, DecodingState, ModelLoader};
use crate::error::BackendError;

/// Loads Vosk model directories
#[derive(Debug, Default)]
pub struct VoskLoader;

impl ModelLoader for VoskLoader {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Box<dyn Decoder>, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::ModelLoad(format!("model path is not UTF-8: {}", path.display())))?;
        let model = vosk::Model::new(path_str)
            .ok_or_else(|| BackendError::ModelLoad(format!("vosk could not load model at {}", path_str)))?;
        let mut recognizer = vosk::Recognizer::new(&model, sample_rate as f32)
            .ok_or_else(|| BackendError::ModelLoad("vosk could not create a recognizer".into()))?;
        recognizer.set_max_alternatives(0);

        Ok(Box::new(VoskDecoder { recognizer }))
    }

    fn name(&self) -> &str {
        "vosk"
    }
}

struct VoskDecoder {
    recognizer: vosk::Recognizer,
}

impl Decoder for VoskDecoder {
    fn accept_waveform(&mut self, samples: &[i16]) -> Result<DecodingState, BackendError> {
        match self.recognizer.accept_waveform(samples) {
            vosk::DecodingState::Finalized => Ok(DecodingState::Finalized),
            vosk::DecodingState::Running => Ok(DecodingState::Running),
            vosk::DecodingState::Failed => Err(BackendError::BackendFailure("vosk decoding failed".into())),
        }
    }

    fn partial_result(&mut self) -> String {
        self.recognizer.partial_result().partial.to_string()
    }

    fn result(&mut self) -> String {
        self.recognizer
            .result()
            .single()
            .map(|r| r.text.to_string())
            .unwrap_or_default()
    }

    fn final_result(&mut self) -> String {
        self.recognizer
            .final_result()
            .single()
            .map(|r| r.text.to_string())
            .unwrap_or_default()
    }

    fn reset(&mut self) {
        self.recognizer.reset();
    }
}
