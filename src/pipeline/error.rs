//! Umbrella error reported through the service's error channel.

use thiserror::Error;

use crate::audio::{DecodeError, ExtractError};
use crate::config::ConfigError;
use crate::encoder::{EncodeError, EncoderUnavailable};
use crate::loader::LoadError;

/// Every failure the pipeline can surface.
///
/// Construction failures are returned from
/// [`AudioWorkService::new`](super::AudioWorkService::new); everything else
/// is delivered to the callback registered with `on_error`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("extraction rejected: {0}")]
    Extract(#[from] ExtractError),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    EncoderUnavailable(#[from] EncoderUnavailable),

    /// An extraction was requested while the previous encode is in flight.
    #[error("an encode is already in flight")]
    EncoderBusy,

    /// The service was constructed outside a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// The encoder thread could not be started.
    #[error("failed to start encoder thread: {0}")]
    Spawn(String),
}
