//! Audio stages — decode → extract.
//!
//! # Pipeline
//!
//! ```text
//! encoded bytes → decode_audio (symphonia, blocking pool)
//!              → deinterleave → resample to configured rate → DecodedAudio
//!              → extract(range) → PcmSlice (channel 0) → encoder
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use audio_work::audio::{decode_audio, extract, ExtractionRange};
//!
//! let bytes = std::fs::read("speech.wav").unwrap();
//! let decoded = decode_audio(bytes, 16_000, 16_000 * 50).unwrap();
//! let slice = extract(&decoded, ExtractionRange::new(0.0, 1.0)).unwrap();
//! assert_eq!(slice.len(), 16_000);
//! ```

pub mod decoder;
pub mod extract;
pub mod resample;
pub mod types;

pub use decoder::{decode_audio, decode_audio_async, DecodeError};
pub use extract::{extract, ExtractError};
pub use resample::{deinterleave, resample};
pub use types::{DecodedAudio, ExtractionRange, PcmSlice};
