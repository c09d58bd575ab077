//! Background container encoding.
//!
//! This module provides:
//! * [`ContainerEncoder`] — trait for anything that turns mono `f32` into a
//!   self-contained file.
//! * [`WavEncoder`] — `hound`-backed RIFF/WAVE implementation (`audio/wav`).
//! * [`BackgroundEncoder`] — dedicated encoder thread with a `Dump` / `Close`
//!   message protocol and asynchronous replies.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audio_work::encoder::{BackgroundEncoder, EncoderReply, WavEncoder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let mut encoder = BackgroundEncoder::spawn(WavEncoder::default(), tx).unwrap();
//!
//!     encoder.encode(16_000, vec![0.0; 16_000]).unwrap();
//!     if let Some(EncoderReply::Encoded { bytes, .. }) = rx.recv().await {
//!         println!("{} bytes of WAV", bytes.len());
//!     }
//!     encoder.terminate();
//! }
//! ```

pub mod wav;
pub mod worker;

pub use wav::{ContainerEncoder, EncodeError, WavEncoder};
pub use worker::{BackgroundEncoder, EncoderMessage, EncoderReply, EncoderUnavailable};
