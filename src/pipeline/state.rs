//! Pipeline lifecycle state machine.
//!
//! ```text
//! Idle ──load──▶ Loaded ──decoded──▶ Decoded ──extract──▶ Encoding
//!                  │                                         │
//!                  └─extract (before decode)─▶ ExtractionPending
//!                                    ──decoded──▶ Encoding ──encoded──▶ Completed
//! Completed ──extract──▶ Encoding   (idle point of the next cycle)
//! Completed ──load─────▶ Loaded
//! any stage ──error──▶ Failed (recoverable by re-invoking the call)
//! any state ──destroy──▶ Closed (terminal)
//! ```

/// States of an [`AudioWorkService`](super::AudioWorkService).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing loaded yet.
    #[default]
    Idle,

    /// Bytes are being fetched or decoded.
    Loaded,

    /// Decoded audio is available for extraction.
    Decoded,

    /// An extraction is registered and waits for the next decode.
    ExtractionPending,

    /// A slice is being encoded on the background thread.
    Encoding,

    /// The last encode was delivered.  This is also the idle state between
    /// cycles: the decoded audio is kept, so `extract` goes straight to
    /// [`Encoding`](Self::Encoding) and `load_*` starts over as from
    /// [`Idle`](Self::Idle).
    Completed,

    /// The last stage failed.  Loading or extracting again recovers.
    Failed,

    /// [`destroy`](super::AudioWorkService::destroy) was called; the instance
    /// is inert.
    Closed,
}

impl PipelineState {
    /// Returns `true` while asynchronous work is outstanding.
    ///
    /// ```
    /// use audio_work::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Loaded.is_busy());
    /// assert!(PipelineState::ExtractionPending.is_busy());
    /// assert!(PipelineState::Encoding.is_busy());
    /// assert!(!PipelineState::Completed.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Loaded | PipelineState::ExtractionPending | PipelineState::Encoding
        )
    }

    /// `true` once the instance has been torn down.
    pub fn is_closed(&self) -> bool {
        matches!(self, PipelineState::Closed)
    }

    /// A short human-readable label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Loaded => "Loading",
            PipelineState::Decoded => "Decoded",
            PipelineState::ExtractionPending => "Waiting for decode",
            PipelineState::Encoding => "Encoding",
            PipelineState::Completed => "Done",
            PipelineState::Failed => "Error",
            PipelineState::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
