//! Pipeline façade for the audio work service.
//!
//! This module wires load → decode → extract → encode and exposes the state
//! the caller can poll between callbacks.
//!
//! # Architecture
//!
//! ```text
//! AudioWorkService (caller thread, non-blocking)
//!        │
//!        ├─ load_from_buffer / load_from_url ─▶ fetch task ─▶ decode task
//!        │                                                       │
//!        ├─ extract(from, to) ◀──── Decoded event ───────────────┘
//!        │        │
//!        │        └─ BackgroundEncoder ("audio-encoder" thread)
//!        │                   │
//!        └─ on_encoded ◀──── Encoded event ◀── reply pump task
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audio_work::config::PipelineConfig;
//! use audio_work::pipeline::AudioWorkService;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bytes = std::fs::read("speech.wav").unwrap();
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!
//!     let service = AudioWorkService::new(PipelineConfig::new(16_000, false)).unwrap();
//!     service
//!         .on_encoded(move |clip| {
//!             let _ = tx.send(clip);
//!         })
//!         .load_from_buffer(bytes)
//!         .extract(0.0, 1.0);
//!
//!     let clip = rx.await.unwrap();
//!     println!("{} bytes of {}", clip.size, clip.mime_type);
//! }
//! ```

pub mod error;
pub mod result;
pub mod service;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use error::PipelineError;
pub use result::EncodedResult;
pub use service::AudioWorkService;
pub use state::PipelineState;
