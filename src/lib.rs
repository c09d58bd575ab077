//! Client-side audio work pipeline.
//!
//! Load encoded audio from memory or a URL, decode it to PCM at a fixed
//! rate, cut a `[from, to)` window out of channel 0 and re-encode it as a
//! WAV file on a background thread.  See [`pipeline::AudioWorkService`].

pub mod audio;
pub mod config;
pub mod encoder;
pub mod events;
pub mod loader;
pub mod pipeline;

pub use config::{AppConfig, PipelineConfig};
pub use events::{EventChannel, EventKind, PipelineEvent};
pub use pipeline::{AudioWorkService, EncodedResult, PipelineError, PipelineState};
