use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::AudioFormat;
use crate::recognition::RecognitionConfig;
use crate::session::{ConflictPolicy, MAX_READ_TIMEOUT};

/// Default config file (extension resolved by the `config` crate)
pub const DEFAULT_CONFIG_PATH: &str = "config/loqa-speech";

/// Environment overrides, e.g. `LOQA_SPEECH__NATS__URL`
pub const ENV_PREFIX: &str = "LOQA_SPEECH";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub model: ModelConfig,
    pub nats: NatsConfig,
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Microphone,
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub input: InputKind,
    /// WAV clip used when `input = "file"`
    pub file_path: Option<PathBuf>,
    /// Pace file frames at capture speed
    pub realtime: bool,
    pub preferred_device: Option<String>,
    pub sample_rate: u32,
    pub frame_samples: usize,
    pub read_timeout_ms: u64,
}

impl AudioConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            frame_samples: self.frame_samples,
            ..AudioFormat::default()
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Model directory loaded into new streaming sessions
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub enabled: bool,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    pub conflict_policy: ConflictPolicy,
}

impl Config {
    /// Load `path` (optional) over built-in defaults, then apply environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "loqa-speech")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 3010)?
            .set_default("audio.input", "microphone")?
            .set_default("audio.realtime", true)?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.frame_samples", 2048)?
            .set_default("audio.read_timeout_ms", 100)?
            .set_default("nats.enabled", false)?
            .set_default("nats.url", "nats://localhost:4222")?
            .set_default("sessions.conflict_policy", "preempt")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.audio
            .format()
            .validate()
            .context("Invalid [audio] section")?;
        self.recognition
            .validate()
            .context("Invalid [recognition] section")?;
        let read_timeout = self.audio.read_timeout();
        if read_timeout.is_zero() || read_timeout > MAX_READ_TIMEOUT {
            anyhow::bail!(
                "audio.read_timeout_ms must be between 1 and {}",
                MAX_READ_TIMEOUT.as_millis()
            );
        }
        if self.audio.input == InputKind::File && self.audio.file_path.is_none() {
            anyhow::bail!("audio.file_path is required when audio.input = \"file\"");
        }
        Ok(())
    }
}
