pub mod convert;
pub mod device;
pub mod file;
pub mod source;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use device::{AudioDevice, AudioFormat, AudioFrame, AudioStream, FrameRead, SourceProfile, StreamRead};
pub use file::{AudioFile, WavFileDevice};
pub use source::{AudioFrameSource, DEFAULT_PROFILES};

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneDevice;
