//! Time-range extraction from decoded audio.
//!
//! [`extract`] is a pure function: it validates the requested window against
//! the decoded buffer and copies the matching run of channel 0.

use thiserror::Error;

use super::types::{DecodedAudio, ExtractionRange, PcmSlice};

/// Why a requested window cannot be served.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractError {
    /// `from` is not strictly before `to` (or a bound is negative / not finite).
    #[error("'from' must be less than 'to' (got {from_secs} >= {to_secs})")]
    InvalidRange { from_secs: f64, to_secs: f64 },

    /// The window ends past the decoded audio.
    #[error(
        "'to' exceeds audio length: {to_secs}s needs {end_sample} samples, only {length} decoded"
    )]
    RangeOutOfBounds {
        to_secs: f64,
        end_sample: usize,
        length: usize,
    },
}

/// Slice `range` out of channel 0 of `decoded`.
///
/// Sample bounds are `seconds * decoded.sample_rate()`, truncated toward
/// zero.  On success the slice holds exactly `end - start` samples.
///
/// # Errors
///
/// - [`ExtractError::InvalidRange`] when `range.from_secs >= range.to_secs`.
/// - [`ExtractError::RangeOutOfBounds`] when `range.to_secs * sample_rate`
///   exceeds the decoded length.
pub fn extract(decoded: &DecodedAudio, range: ExtractionRange) -> Result<PcmSlice, ExtractError> {
    if !range.is_ordered() {
        return Err(ExtractError::InvalidRange {
            from_secs: range.from_secs,
            to_secs: range.to_secs,
        });
    }

    let sample_rate = decoded.sample_rate();
    let channel = decoded.channel(0).unwrap_or(&[]);
    let (start, end) = range.sample_bounds(sample_rate);

    if range.end_position(sample_rate) > channel.len() as f64 {
        return Err(ExtractError::RangeOutOfBounds {
            to_secs: range.to_secs,
            end_sample: end,
            length: channel.len(),
        });
    }

    Ok(PcmSlice {
        sample_rate,
        samples: channel[start..end].to_vec(),
    })
}
