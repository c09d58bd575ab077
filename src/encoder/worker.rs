//! Dedicated OS-thread container encoder.
//!
//! [`BackgroundEncoder`] owns a named thread (`audio-encoder`) that runs a
//! [`ContainerEncoder`] and speaks a two-message protocol:
//!
//! | Request                          | Reply                          |
//! |----------------------------------|--------------------------------|
//! | `Dump { sample_rate, samples }`  | one [`EncoderReply`]           |
//! | `Close`                          | none; the thread exits         |
//!
//! Requests travel over a `std::sync::mpsc` channel so the thread can block
//! on `recv`; replies go out on a `tokio::sync::mpsc` unbounded channel so an
//! async receiver can await them.  The orchestrator never joins the thread:
//! [`terminate`](BackgroundEncoder::terminate) only posts `Close`, and any
//! reply still produced by in-flight work is the receiver's to ignore.

use std::sync::mpsc;
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use super::wav::{ContainerEncoder, EncodeError};

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Requests accepted by the encoder thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderMessage {
    /// Encode `samples` (mono) at `sample_rate` and reply with the bytes.
    Dump { sample_rate: u32, samples: Vec<f32> },
    /// Dispose of the encoder; no reply.
    Close,
}

/// Completion signal for a `Dump` request.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderReply {
    Encoded {
        mime_type: &'static str,
        bytes: Vec<u8>,
    },
    Failed(EncodeError),
}

/// A message was posted after [`BackgroundEncoder::terminate`] (or after the
/// thread died).
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("background encoder is no longer accepting messages")]
pub struct EncoderUnavailable;

// ---------------------------------------------------------------------------
// BackgroundEncoder
// ---------------------------------------------------------------------------

/// Handle to a running encoder thread.
///
/// Dropping the handle terminates the thread the same way
/// [`terminate`](Self::terminate) does.
pub struct BackgroundEncoder {
    tx: Option<mpsc::Sender<EncoderMessage>>,
    mime_type: &'static str,
    /// Never joined; kept so the thread is not detached while the handle lives.
    _thread: JoinHandle<()>,
}

impl std::fmt::Debug for BackgroundEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundEncoder")
            .field("mime_type", &self.mime_type)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl BackgroundEncoder {
    /// Move `encoder` onto a new `audio-encoder` thread.  Every `Dump`
    /// produces exactly one reply on `replies`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<E: ContainerEncoder>(
        mut encoder: E,
        replies: UnboundedSender<EncoderReply>,
    ) -> std::io::Result<Self> {
        let mime_type = encoder.mime_type();
        let (tx, rx) = mpsc::channel::<EncoderMessage>();

        let thread = std::thread::Builder::new()
            .name("audio-encoder".into())
            .spawn(move || {
                while let Ok(message) = rx.recv() {
                    match message {
                        EncoderMessage::Dump {
                            sample_rate,
                            samples,
                        } => {
                            let reply = match encoder.encode(sample_rate, &samples) {
                                Ok(bytes) => EncoderReply::Encoded {
                                    mime_type: encoder.mime_type(),
                                    bytes,
                                },
                                Err(e) => EncoderReply::Failed(e),
                            };
                            if replies.send(reply).is_err() {
                                log::debug!("encoder: reply receiver dropped, exiting");
                                break;
                            }
                        }
                        EncoderMessage::Close => break,
                    }
                }
                log::debug!("encoder: worker thread finished");
            })?;

        Ok(Self {
            tx: Some(tx),
            mime_type,
            _thread: thread,
        })
    }

    /// Mime type of the container this encoder produces.
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// `true` once [`terminate`](Self::terminate) has been called.
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Post a raw protocol message.
    pub fn post(&self, message: EncoderMessage) -> Result<(), EncoderUnavailable> {
        let tx = self.tx.as_ref().ok_or(EncoderUnavailable)?;
        tx.send(message).map_err(|_| EncoderUnavailable)
    }

    /// Request an encode; the result arrives on the reply channel.
    pub fn encode(&self, sample_rate: u32, samples: Vec<f32>) -> Result<(), EncoderUnavailable> {
        self.post(EncoderMessage::Dump {
            sample_rate,
            samples,
        })
    }

    /// Post `Close` and stop accepting messages.  Idempotent.
    pub fn terminate(&mut self) {
        if let Some(tx) = self.tx.take() {
            // The thread may already be gone; nothing to report then.
            let _ = tx.send(EncoderMessage::Close);
        }
    }
}

impl Drop for BackgroundEncoder {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
