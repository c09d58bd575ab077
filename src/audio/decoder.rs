//! In-memory audio decoding via `symphonia`.
//!
//! [`decode_audio`] probes an encoded byte buffer (WAV, FLAC, MP3, Ogg
//! Vorbis, AAC/MP4), decodes packets of the first audio track into planar
//! `f32` and resamples each plane to the requested rate.  Packet decoding
//! stops once enough source frames for the working capacity are in hand, so
//! long inputs cost no more than the capacity allows.
//!
//! Decoding is CPU-bound; async callers use [`decode_audio_async`], which
//! moves the work onto tokio's blocking pool.

use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::resample::{deinterleave, resample};
use super::types::DecodedAudio;

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// The input could not be turned into PCM.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// The bytes are not a recognised container.
    #[error("unrecognised audio container: {0}")]
    Probe(String),

    /// The container holds no decodable audio track.
    #[error("no audio track found")]
    NoTrack,

    /// No decoder is available for the track's codec.
    #[error("unsupported codec: {0}")]
    Codec(String),

    /// The stream is corrupt beyond recovery.
    #[error("corrupt audio stream: {0}")]
    Corrupt(String),

    /// Decoding finished without producing a single sample.
    #[error("audio stream decoded to zero samples")]
    Empty,

    /// The blocking decode task panicked or was cancelled.
    #[error("decode task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// decode_audio
// ---------------------------------------------------------------------------

/// Decode `bytes` to planar PCM at `target_rate`, keeping at most `capacity`
/// samples per channel.
///
/// Individual packets that fail to decode are skipped; the call fails only
/// when the container cannot be read or nothing decodes at all.
pub fn decode_audio<B>(
    bytes: B,
    target_rate: u32,
    capacity: usize,
) -> Result<DecodedAudio, DecodeError>
where
    B: AsRef<[u8]> + Send + Sync + 'static,
{
    let Interleaved {
        samples,
        channels,
        source_rate,
    } = read_interleaved(bytes, target_rate, capacity)?;

    let planes: Vec<Vec<f32>> = deinterleave(&samples, channels)
        .into_iter()
        .map(|plane| {
            let mut plane = resample(&plane, source_rate, target_rate);
            plane.truncate(capacity);
            plane
        })
        .collect();

    log::debug!(
        "decoder: {} channel(s), {} Hz → {} Hz, {} samples per channel",
        channels,
        source_rate,
        target_rate,
        planes.first().map_or(0, Vec::len)
    );

    Ok(DecodedAudio::new(target_rate, planes))
}

/// Source frames needed to fill `capacity` samples at `target_rate`, plus
/// one for interpolation.
fn frame_budget(capacity: usize, source_rate: u32, target_rate: u32) -> usize {
    if target_rate == 0 {
        return usize::MAX;
    }
    let frames = (capacity as u64)
        .saturating_mul(source_rate as u64)
        .div_ceil(target_rate as u64)
        .saturating_add(1);
    usize::try_from(frames).unwrap_or(usize::MAX)
}

/// Raw decoder output at the source rate.
struct Interleaved {
    samples: Vec<f32>,
    channels: usize,
    source_rate: u32,
}

impl Interleaved {
    fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Decode packets until EOF or until the frame budget for `capacity` is met.
fn read_interleaved<B>(
    bytes: B,
    target_rate: u32,
    capacity: usize,
) -> Result<Interleaved, DecodeError>
where
    B: AsRef<[u8]> + Send + Sync + 'static,
{
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut out = Interleaved {
        samples: Vec::new(),
        channels: track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(0),
        source_rate: track.codec_params.sample_rate.unwrap_or(0),
    };

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                if out.samples.is_empty() {
                    return Err(DecodeError::Corrupt(e.to_string()));
                }
                log::warn!("decoder: stopping at unreadable packet: {e}");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("decoder: skipping malformed packet: {e}");
                continue;
            }
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        let spec = *decoded.spec();
        out.source_rate = spec.rate;
        out.channels = spec.channels.count();

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        out.samples.extend_from_slice(buf.samples());

        if out.frames() >= frame_budget(capacity, out.source_rate, target_rate) {
            log::debug!(
                "decoder: capacity of {capacity} samples reached after {} source frames",
                out.frames()
            );
            break;
        }
    }

    if out.samples.is_empty() || out.channels == 0 || out.source_rate == 0 {
        return Err(DecodeError::Empty);
    }
    Ok(out)
}

/// [`decode_audio`] on tokio's blocking pool.
pub async fn decode_audio_async(
    bytes: Arc<[u8]>,
    target_rate: u32,
    capacity: usize,
) -> Result<DecodedAudio, DecodeError> {
    tokio::task::spawn_blocking(move || decode_audio(bytes, target_rate, capacity))
        .await
        .map_err(|e| DecodeError::Task(e.to_string()))?
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
