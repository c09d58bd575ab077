//! Sample-rate conversion and channel layout helpers for the decoder.
//!
//! Decoded audio arrives interleaved at the source rate; the pipeline works
//! on planar channels at the configured rate.  This module provides the two
//! conversion steps:
//!
//! 1. [`deinterleave`] — split interleaved frames into one plane per channel.
//! 2. [`resample`] — convert a plane from any source rate to the target rate.
//!
//! The resampler uses linear interpolation: fast, deterministic output
//! lengths, and adequate for speech-band clips.

// ---------------------------------------------------------------------------
// deinterleave
// ---------------------------------------------------------------------------

/// Split interleaved samples into `channels` planes.
///
/// A trailing partial frame is dropped.  `channels == 0` yields no planes.
///
/// # Example
///
/// ```rust
/// use audio_work::audio::deinterleave;
///
/// let planes = deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
/// assert_eq!(planes, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
/// ```
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }
    if channels == 1 {
        return vec![samples.to_vec()];
    }

    let frames = samples.len() / channels;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }
    planes
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample `samples` from `source_rate` Hz to `target_rate` Hz using linear
/// interpolation.
///
/// * Equal rates return the input unchanged (no interpolation performed).
/// * Empty input or a zero rate returns an empty vector.
///
/// The output length is `ceil(samples.len() * target_rate / source_rate)`.
///
/// # Example
///
/// ```rust
/// use audio_work::audio::resample;
///
/// // Downsample from 48 kHz to 16 kHz (ratio = 1/3)
/// let hi = vec![0.5_f32; 480];
/// let lo = resample(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len =
        (samples.len() as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            samples[samples.len() - 1]
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleave_mono_is_copy() {
        let planes = deinterleave(&[0.1, 0.2, 0.3], 1);
        assert_eq!(planes, vec![vec![0.1, 0.2, 0.3]]);
    }

    #[test]
    fn deinterleave_drops_partial_frame() {
        let planes = deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(planes, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn deinterleave_zero_channels() {
        assert!(deinterleave(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn same_rate_is_noop() {
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(resample(&[], 44_100, 16_000).is_empty());
    }

    #[test]
    fn zero_rate_returns_empty() {
        assert!(resample(&[0.5; 10], 0, 16_000).is_empty());
    }

    #[test]
    fn downsample_44k_length() {
        let input = vec![0.0_f32; 44_100];
        let out = resample(&input, 44_100, 16_000);
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn upsample_8k_doubles_length() {
        let input = vec![0.25_f32; 8_000];
        let out = resample(&input, 8_000, 16_000);
        assert_eq!(out.len(), 16_000);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn interpolates_between_neighbours() {
        // 2x upsample of a ramp puts midpoints between source samples.
        let out = resample(&[0.0, 1.0], 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }
}
