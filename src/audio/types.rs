//! Plain data carried between pipeline stages.

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// Fully decoded PCM audio, one `f32` plane per channel.
///
/// Produced once per load by the decoder and never mutated afterwards; the
/// pipeline shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// Wrap per-channel planes.  Planes are truncated to the shortest one so
    /// every channel reports the same length.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        for plane in &mut channels {
            plane.truncate(len);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length of every channel in samples.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples of channel `index`, or `None` when out of range.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// ExtractionRange
// ---------------------------------------------------------------------------

/// A `[from, to)` window in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionRange {
    pub from_secs: f64,
    pub to_secs: f64,
}

impl ExtractionRange {
    pub fn new(from_secs: f64, to_secs: f64) -> Self {
        Self { from_secs, to_secs }
    }

    /// `true` when `from < to`, `from >= 0` and both bounds are finite.
    pub fn is_ordered(&self) -> bool {
        self.from_secs.is_finite()
            && self.to_secs.is_finite()
            && self.from_secs >= 0.0
            && self.from_secs < self.to_secs
    }

    /// Fractional sample position of the start bound.
    pub fn start_position(&self, sample_rate: u32) -> f64 {
        self.from_secs * sample_rate as f64
    }

    /// Fractional sample position of the end bound.
    pub fn end_position(&self, sample_rate: u32) -> f64 {
        self.to_secs * sample_rate as f64
    }

    /// Integer `(start, end)` sample indices, truncated toward zero.
    pub fn sample_bounds(&self, sample_rate: u32) -> (usize, usize) {
        (
            self.start_position(sample_rate) as usize,
            self.end_position(sample_rate) as usize,
        )
    }
}

// ---------------------------------------------------------------------------
// PcmSlice
// ---------------------------------------------------------------------------

/// A contiguous single-channel run of samples, consumed by the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmSlice {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl PcmSlice {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
