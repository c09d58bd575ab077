//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! A [`PipelineConfig`] is immutable once handed to
//! [`AudioWorkService`](crate::pipeline::AudioWorkService); call
//! [`PipelineConfig::validate`] (the service does) to reject unusable values.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Reasons a configuration was rejected at construction time.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be a positive integer (got {0})")]
    InvalidSampleRate(u32),

    #[error("decode capacity must be at least one second (got {0})")]
    InvalidDecodeCapacity(u32),

    #[error("unsupported bits per sample: {0} (expected 16 or 32)")]
    UnsupportedBitDepth(u16),
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Settings that drive decoding and extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target sample rate in Hz.  Decoded audio is resampled to this rate and
    /// extraction bounds are computed as `seconds * sample_rate`.
    pub sample_rate: u32,
    /// Emit verbose per-stage diagnostics at `debug` level.
    pub debug_log: bool,
    /// Working capacity of the decoder in seconds.  Decoded audio longer than
    /// this is truncated.
    pub max_decode_secs: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            debug_log: false,
            max_decode_secs: 50,
        }
    }
}

impl PipelineConfig {
    /// Config with the given sample rate and debug flag, default capacity.
    pub fn new(sample_rate: u32, debug_log: bool) -> Self {
        Self {
            sample_rate,
            debug_log,
            ..Self::default()
        }
    }

    /// Reject non-positive sample rates and an empty decode capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.max_decode_secs == 0 {
            return Err(ConfigError::InvalidDecodeCapacity(self.max_decode_secs));
        }
        Ok(())
    }

    /// Maximum number of samples per channel the decoder will keep.
    pub fn decode_capacity(&self) -> usize {
        self.sample_rate as usize * self.max_decode_secs as usize
    }
}

// ---------------------------------------------------------------------------
// HttpConfig
// ---------------------------------------------------------------------------

/// Settings for the network transport used by `load_from_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Maximum seconds to wait for a complete response.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("audio-work/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

// ---------------------------------------------------------------------------
// EncoderConfig
// ---------------------------------------------------------------------------

/// Settings for the WAV container produced by the background encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// 16 → signed integer PCM, 32 → IEEE float PCM.
    pub bits_per_sample: u16,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { bits_per_sample: 16 }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.bits_per_sample {
            16 | 32 => Ok(()),
            other => Err(ConfigError::UnsupportedBitDepth(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use audio_work::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Decode / extraction settings.
    pub pipeline: PipelineConfig,
    /// Network transport settings.
    pub http: HttpConfig,
    /// Container encoder settings.
    pub encoder: EncoderConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.encoder.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
