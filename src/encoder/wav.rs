//! Container encoders.
//!
//! [`ContainerEncoder`] is the seam between the background worker and the
//! byte-level format.  [`WavEncoder`] is the production implementation,
//! writing a RIFF/WAVE file into memory with `hound`.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use crate::config::EncoderConfig;

// ---------------------------------------------------------------------------
// EncodeError
// ---------------------------------------------------------------------------

/// Errors raised while producing container bytes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EncodeError {
    #[error("unsupported bits per sample: {0}")]
    UnsupportedBitDepth(u16),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("WAV writer failed: {0}")]
    Wav(String),
}

impl From<hound::Error> for EncodeError {
    fn from(e: hound::Error) -> Self {
        EncodeError::Wav(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ContainerEncoder trait
// ---------------------------------------------------------------------------

/// Turns a mono `f32` run into a self-contained audio file.
///
/// Implementations are moved onto the encoder thread, so they must be `Send`.
pub trait ContainerEncoder: Send + 'static {
    /// Mime type of the bytes returned by [`encode`](Self::encode).
    fn mime_type(&self) -> &'static str;

    fn encode(&mut self, sample_rate: u32, samples: &[f32]) -> Result<Vec<u8>, EncodeError>;
}

// ---------------------------------------------------------------------------
// WavEncoder
// ---------------------------------------------------------------------------

/// Mono WAV writer: 16-bit signed integer or 32-bit float PCM.
#[derive(Debug, Clone)]
pub struct WavEncoder {
    bits_per_sample: u16,
}

impl WavEncoder {
    pub const MIME_TYPE: &'static str = "audio/wav";

    pub fn new(bits_per_sample: u16) -> Result<Self, EncodeError> {
        match bits_per_sample {
            16 | 32 => Ok(Self { bits_per_sample }),
            other => Err(EncodeError::UnsupportedBitDepth(other)),
        }
    }

    pub fn from_config(config: &EncoderConfig) -> Result<Self, EncodeError> {
        Self::new(config.bits_per_sample)
    }
}

impl Default for WavEncoder {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
        }
    }
}

impl ContainerEncoder for WavEncoder {
    fn mime_type(&self) -> &'static str {
        Self::MIME_TYPE
    }

    fn encode(&mut self, sample_rate: u32, samples: &[f32]) -> Result<Vec<u8>, EncodeError> {
        if sample_rate == 0 {
            return Err(EncodeError::InvalidSampleRate(sample_rate));
        }

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: if self.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        };

        let mut cursor = Cursor::new(Vec::with_capacity(
            44 + samples.len() * (self.bits_per_sample as usize / 8),
        ));
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            if self.bits_per_sample == 32 {
                for &s in samples {
                    writer.write_sample(s)?;
                }
            } else {
                for &s in samples {
                    let clamped = s.clamp(-1.0, 1.0);
                    writer.write_sample((clamped * i16::MAX as f32) as i16)?;
                }
            }
            writer.finalize()?;
        }

        Ok(cursor.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
