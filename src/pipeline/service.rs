//! The decode → extract → encode façade.
//!
//! [`AudioWorkService`] owns the configuration, the current raw bytes and
//! decoded audio, the [`EventChannel`] and the [`BackgroundEncoder`].  Its
//! methods never block: each one records intent, spawns whatever async work
//! is needed on the captured tokio runtime, and returns `&Self` so calls can
//! be chained.  Results and failures come back through callbacks.
//!
//! # Flow
//!
//! ```text
//! load_from_buffer / load_from_url
//!   └─▶ [fetch task] ─▶ decode task (blocking pool) ─▶ publish(Decoded)
//!                                                          │
//! extract(from, to) ──(before decode: registered)──────────┤
//!                                                          ▼
//!                              slice channel 0 ─▶ BackgroundEncoder (Dump)
//!                                                          │
//!                 reply pump task ◀──── EncoderReply ──────┘
//!                     └─▶ publish(Encoded) ─▶ on_encoded callback (once)
//!
//! any failure ─▶ publish(Error) ─▶ on_error callback
//! destroy() ─▶ clear listeners, Close encoder, state = Closed
//! ```
//!
//! Each load bumps a generation counter; completions from an earlier load
//! are discarded, so the newest load always wins.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::audio::{decode_audio_async, extract, DecodeError, DecodedAudio, ExtractError, ExtractionRange};
use crate::config::{AppConfig, HttpConfig, PipelineConfig};
use crate::encoder::{BackgroundEncoder, ContainerEncoder, EncoderReply, WavEncoder};
use crate::events::{EventChannel, EventKind, PipelineEvent};
use crate::loader::{HttpTransport, LoadError, Loader, Transport};

use super::error::PipelineError;
use super::result::EncodedResult;
use super::state::PipelineState;

// ---------------------------------------------------------------------------
// Shared internals
// ---------------------------------------------------------------------------

/// Mutable pipeline data, guarded by one lock.  Never held across an
/// `.await` or while listeners run.
struct Core {
    state: PipelineState,
    generation: u64,
    raw: Option<Arc<[u8]>>,
    decoded: Option<Arc<DecodedAudio>>,
    pending: Option<ExtractionRange>,
    encoding: bool,
    encoder: BackgroundEncoder,
}

struct Shared {
    config: PipelineConfig,
    mime_type: &'static str,
    events: EventChannel,
    loader: Loader,
    runtime: Handle,
    closed: AtomicBool,
    core: Mutex<Core>,
}

impl Shared {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        if self.config.debug_log {
            log::debug!("{args}");
        }
    }

    /// Deliver `error` to the error channel.
    fn report(&self, error: PipelineError) {
        if self.is_closed() {
            return;
        }
        log::warn!("pipeline: {error}");
        self.events.publish(&PipelineEvent::Error(error));
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Start a new load: invalidate earlier decodes and return the new
    /// generation.
    fn begin_load(core: &mut Core) -> u64 {
        core.generation += 1;
        core.decoded = None;
        core.state = if core.pending.is_some() {
            PipelineState::ExtractionPending
        } else {
            PipelineState::Loaded
        };
        core.generation
    }

    fn load_from_buffer(self: &Arc<Self>, bytes: Arc<[u8]>) {
        if self.is_closed() {
            return;
        }
        if self.loader.is_busy() {
            self.report(LoadError::Busy.into());
            return;
        }

        let generation = {
            let mut core = self.core();
            let generation = Self::begin_load(&mut core);
            core.raw = Some(Arc::clone(&bytes));
            generation
        };

        self.debug(format_args!(
            "pipeline: loading {} bytes from buffer (load #{generation})",
            bytes.len()
        ));
        self.spawn_decode(bytes, generation);
    }

    fn load_from_url(self: &Arc<Self>, url: &str) {
        if self.is_closed() {
            return;
        }

        let retrieval = match self.loader.start(url) {
            Ok(retrieval) => retrieval,
            Err(e) => {
                self.report(e.into());
                return;
            }
        };

        let generation = Self::begin_load(&mut self.core());
        self.debug(format_args!("pipeline: fetching {url} (load #{generation})"));

        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = retrieval.run().await;
            shared.debug(format_args!(
                "pipeline: retrieval of {} finished (load #{generation}, ok={})",
                retrieval.url(),
                result.is_ok()
            ));
            match result {
                Ok(bytes) => shared.accept_fetched(generation, bytes.into()),
                Err(e) => shared.fetch_failed(generation, e),
            }
            // Release the loader slot only after the bytes are handled.
            drop(retrieval);
        });
    }

    fn accept_fetched(self: &Arc<Self>, generation: u64, bytes: Arc<[u8]>) {
        if self.is_closed() {
            return;
        }
        {
            let mut core = self.core();
            if core.generation != generation {
                return;
            }
            core.raw = Some(Arc::clone(&bytes));
        }

        self.debug(format_args!(
            "pipeline: fetched {} bytes (load #{generation})",
            bytes.len()
        ));
        self.spawn_decode(bytes, generation);
    }

    fn fetch_failed(&self, generation: u64, error: LoadError) {
        if self.is_closed() {
            return;
        }
        {
            let mut core = self.core();
            if core.generation != generation {
                return;
            }
            core.state = PipelineState::Failed;
        }
        self.report(error.into());
    }

    // -----------------------------------------------------------------------
    // Decode
    // -----------------------------------------------------------------------

    fn spawn_decode(self: &Arc<Self>, bytes: Arc<[u8]>, generation: u64) {
        let shared = Arc::clone(self);
        let sample_rate = self.config.sample_rate;
        let capacity = self.config.decode_capacity();

        self.runtime.spawn(async move {
            let result = decode_audio_async(bytes, sample_rate, capacity).await;
            shared.on_decoded(generation, result);
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.is_closed() && self.core().generation == generation
    }

    fn on_decoded(&self, generation: u64, result: Result<DecodedAudio, DecodeError>) {
        if !self.is_current(generation) {
            log::debug!("pipeline: dropping decode result of superseded load #{generation}");
            return;
        }

        let decoded = match result {
            Ok(decoded) => Arc::new(decoded),
            Err(e) => {
                self.core().state = PipelineState::Failed;
                self.report(e.into());
                return;
            }
        };

        self.debug(format_args!(
            "pipeline: decoded {} channel(s), {} samples at {} Hz ({:.2}s)",
            decoded.channel_count(),
            decoded.len(),
            decoded.sample_rate(),
            decoded.duration_secs()
        ));

        // Announce first; extraction may only read the audio afterwards.
        self.events
            .publish(&PipelineEvent::Decoded(Arc::clone(&decoded)));

        let pending = {
            let mut core = self.core();
            if self.is_closed() || core.generation != generation {
                return;
            }
            core.decoded = Some(decoded);
            core.state = PipelineState::Decoded;
            core.pending.take()
        };

        if let Some(range) = pending {
            self.run_extraction(range);
        }
    }

    // -----------------------------------------------------------------------
    // Extract → encode
    // -----------------------------------------------------------------------

    fn extract(&self, range: ExtractionRange) {
        if self.is_closed() {
            return;
        }
        if !range.is_ordered() {
            self.debug(format_args!(
                "pipeline: 'from' must be less than 'to' (got {} >= {})",
                range.from_secs, range.to_secs
            ));
            self.report(
                ExtractError::InvalidRange {
                    from_secs: range.from_secs,
                    to_secs: range.to_secs,
                }
                .into(),
            );
            return;
        }
        self.run_extraction(range);
    }

    /// Slice and hand off to the encoder, or register `range` until the next
    /// decode.
    fn run_extraction(&self, range: ExtractionRange) {
        if self.is_closed() {
            return;
        }

        let outcome = {
            let mut core = self.core();
            match core.decoded.clone() {
                None => {
                    core.pending = Some(range);
                    core.state = PipelineState::ExtractionPending;
                    None
                }
                Some(decoded) => Some(Self::start_encode(&mut core, &decoded, range)),
            }
        };

        match outcome {
            None => self.debug(format_args!(
                "pipeline: extraction {:.3}s..{:.3}s registered, waiting for decode",
                range.from_secs, range.to_secs
            )),
            Some(Ok((start, end))) => self.debug(format_args!(
                "pipeline: extracted samples {start}..{end} ({} samples), encoding",
                end - start
            )),
            Some(Err(e)) => self.report(e),
        }
    }

    fn start_encode(
        core: &mut Core,
        decoded: &DecodedAudio,
        range: ExtractionRange,
    ) -> Result<(usize, usize), PipelineError> {
        if core.encoding {
            return Err(PipelineError::EncoderBusy);
        }

        let slice = extract(decoded, range)?;
        let bounds = range.sample_bounds(slice.sample_rate);
        core.encoder.encode(slice.sample_rate, slice.samples)?;

        core.encoding = true;
        core.state = PipelineState::Encoding;
        Ok(bounds)
    }

    fn on_encoder_reply(&self, reply: EncoderReply) {
        if self.is_closed() {
            log::debug!("pipeline: dropping encoder reply after destroy");
            return;
        }

        {
            let mut core = self.core();
            core.encoding = false;
            if core.state == PipelineState::Encoding {
                core.state = match reply {
                    EncoderReply::Encoded { .. } => PipelineState::Completed,
                    EncoderReply::Failed(_) => PipelineState::Failed,
                };
            }
        }

        match reply {
            EncoderReply::Encoded { mime_type, bytes } => {
                let result = EncodedResult::new(mime_type, bytes);
                self.debug(format_args!(
                    "pipeline: data available: {} bytes of {} ({})",
                    result.size, result.mime_type, result.handle
                ));
                self.events.publish(&PipelineEvent::Encoded(result));
            }
            EncoderReply::Failed(e) => self.report(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    fn destroy(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.events.clear();

        let mut core = self.core();
        core.encoder.terminate();
        core.state = PipelineState::Closed;
        core.raw = None;
        core.decoded = None;
        core.pending = None;
        core.encoding = false;

        log::debug!("pipeline: destroyed");
    }
}

/// Forward encoder replies to the service until either side goes away.
async fn pump_replies(shared: Weak<Shared>, mut replies: UnboundedReceiver<EncoderReply>) {
    while let Some(reply) = replies.recv().await {
        match shared.upgrade() {
            Some(shared) => shared.on_encoder_reply(reply),
            None => break,
        }
    }
    log::debug!("pipeline: encoder reply channel closed");
}

// ---------------------------------------------------------------------------
// AudioWorkService
// ---------------------------------------------------------------------------

/// Loads encoded audio, extracts a time range from channel 0 and re-encodes
/// it on a background thread.
///
/// Must be constructed inside a tokio runtime; all asynchronous work is
/// spawned on that runtime.  Dropping the service calls
/// [`destroy`](Self::destroy).
///
/// ```rust,no_run
/// use audio_work::config::PipelineConfig;
/// use audio_work::pipeline::AudioWorkService;
///
/// # async fn example() {
/// let service = AudioWorkService::new(PipelineConfig::new(16_000, false)).unwrap();
/// service
///     .on_error(|e| eprintln!("pipeline error: {e}"))
///     .on_encoded(|clip| println!("{} bytes of {}", clip.size, clip.mime_type))
///     .load_from_url("https://example.com/speech.mp3")
///     .extract(0.0, 1.0);
/// # }
/// ```
pub struct AudioWorkService {
    shared: Arc<Shared>,
}

impl fmt::Debug for AudioWorkService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioWorkService")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AudioWorkService {
    /// Create a service with the WAV encoder and an HTTP transport using
    /// default [`HttpConfig`].
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Config`] — `config` failed validation.
    /// - [`PipelineError::NoRuntime`] — called outside a tokio runtime.
    /// - [`PipelineError::Spawn`] — the encoder thread could not start.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_parts(
            config,
            Arc::new(HttpTransport::from_config(&HttpConfig::default())),
            WavEncoder::default(),
        )
    }

    /// Create a service from the full application config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let encoder = WavEncoder::from_config(&config.encoder)?;
        Self::with_parts(
            config.pipeline.clone(),
            Arc::new(HttpTransport::from_config(&config.http)),
            encoder,
        )
    }

    /// Create a service with an explicit transport and container encoder.
    pub fn with_parts<E: ContainerEncoder>(
        config: PipelineConfig,
        transport: Arc<dyn Transport>,
        encoder: E,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| PipelineError::NoRuntime(e.to_string()))?;

        let (reply_tx, reply_rx) = unbounded_channel();
        let encoder = BackgroundEncoder::spawn(encoder, reply_tx)
            .map_err(|e| PipelineError::Spawn(e.to_string()))?;

        let shared = Arc::new(Shared {
            mime_type: encoder.mime_type(),
            events: EventChannel::new(),
            loader: Loader::new(transport),
            runtime: runtime.clone(),
            closed: AtomicBool::new(false),
            core: Mutex::new(Core {
                state: PipelineState::Idle,
                generation: 0,
                raw: None,
                decoded: None,
                pending: None,
                encoding: false,
                encoder,
            }),
            config,
        });

        shared.debug(format_args!("pipeline: configuration {:?}", shared.config));
        runtime.spawn(pump_replies(Arc::downgrade(&shared), reply_rx));

        Ok(Self { shared })
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Replace the current audio with `bytes` and start decoding them.
    ///
    /// Rejected with [`LoadError::Busy`] while a URL retrieval is in flight.
    pub fn load_from_buffer(&self, bytes: impl Into<Arc<[u8]>>) -> &Self {
        self.shared.load_from_buffer(bytes.into());
        self
    }

    /// Fetch `url` with a single GET, then decode the body.
    ///
    /// Only one retrieval may be in flight; a second call before the first
    /// completes is rejected with [`LoadError::Busy`] and the first
    /// continues.  Transport failures are reported and no decode happens.
    pub fn load_from_url(&self, url: &str) -> &Self {
        self.shared.load_from_url(url);
        self
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    /// Extract `[from_secs, to_secs)` from channel 0 and encode it.
    ///
    /// Served immediately when decoded audio is available; otherwise
    /// registered and served after the next decode (a newer registration
    /// replaces an older one).  Rejections go to the error channel and no
    /// encode is requested.
    pub fn extract(&self, from_secs: f64, to_secs: f64) -> &Self {
        self.shared
            .extract(ExtractionRange::new(from_secs, to_secs));
        self
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    /// Register the completion callback for the next encode.
    ///
    /// One-shot: it is removed after firing, so register again before each
    /// extraction.  Registering twice before a completion replaces the
    /// earlier callback.
    pub fn on_encoded<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(EncodedResult) + Send + 'static,
    {
        if self.shared.is_closed() {
            return self;
        }
        let mut callback = Some(callback);
        self.shared.events.remove_all(EventKind::Encoded);
        self.shared
            .events
            .subscribe_once(EventKind::Encoded, move |event| {
                if let (PipelineEvent::Encoded(result), Some(cb)) = (event, callback.take()) {
                    cb(result.clone());
                }
            });
        self
    }

    /// Register the error callback.  It stays registered until
    /// [`destroy`](Self::destroy); registering again replaces it.
    pub fn on_error<F>(&self, mut callback: F) -> &Self
    where
        F: FnMut(PipelineError) + Send + 'static,
    {
        if self.shared.is_closed() {
            return self;
        }
        self.shared.events.remove_all(EventKind::Error);
        self.shared.events.subscribe(EventKind::Error, move |event| {
            if let PipelineEvent::Error(error) = event {
                callback(error.clone());
            }
        });
        self
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Clear all listeners, close the encoder and make the instance inert.
    ///
    /// Safe in any state and idempotent.  Work still in flight completes in
    /// the background but delivers nothing.
    pub fn destroy(&self) {
        self.shared.destroy();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> PipelineState {
        self.shared.core().state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// Mime type of the encoded results.
    pub fn mime_type(&self) -> &'static str {
        self.shared.mime_type
    }

    /// Decoded audio of the current load, once announced.
    pub fn decoded(&self) -> Option<Arc<DecodedAudio>> {
        self.shared.core().decoded.clone()
    }

    /// Size of the raw bytes of the current load, once available.
    pub fn raw_len(&self) -> Option<usize> {
        self.shared.core().raw.as_ref().map(|raw| raw.len())
    }

    /// The underlying event channel, for observing `Decoded` events or
    /// registering additional listeners.
    pub fn events(&self) -> &EventChannel {
        &self.shared.events
    }
}

impl Drop for AudioWorkService {
    fn drop(&mut self) {
        self.shared.destroy();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::tests::wav_fixture;
    use crate::encoder::EncodeError;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    const WAIT: Duration = Duration::from_secs(10);

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Returns a fixed response after an optional delay.
    struct MockTransport {
        response: Result<Vec<u8>, LoadError>,
        delay: Duration,
    }

    impl MockTransport {
        fn ok(body: Vec<u8>) -> Arc<dyn Transport> {
            Arc::new(Self {
                response: Ok(body),
                delay: Duration::ZERO,
            })
        }

        fn slow(body: Vec<u8>, delay: Duration) -> Arc<dyn Transport> {
            Arc::new(Self {
                response: Ok(body),
                delay,
            })
        }

        fn err(error: LoadError) -> Arc<dyn Transport> {
            Arc::new(Self {
                response: Err(error),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, LoadError> {
            tokio::time::sleep(self.delay).await;
            self.response.clone()
        }
    }

    /// WAV encoder that counts requests and can be slowed down.
    struct ProbeEncoder {
        inner: WavEncoder,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl ContainerEncoder for ProbeEncoder {
        fn mime_type(&self) -> &'static str {
            self.inner.mime_type()
        }

        fn encode(&mut self, sample_rate: u32, samples: &[f32]) -> Result<Vec<u8>, EncodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.inner.encode(sample_rate, samples)
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn service_with(
        transport: Arc<dyn Transport>,
        delay: Duration,
    ) -> (AudioWorkService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let encoder = ProbeEncoder {
            inner: WavEncoder::default(),
            calls: Arc::clone(&calls),
            delay,
        };
        let service =
            AudioWorkService::with_parts(PipelineConfig::new(16_000, true), transport, encoder)
                .unwrap();
        (service, calls)
    }

    fn service() -> (AudioWorkService, Arc<AtomicUsize>) {
        service_with(MockTransport::ok(Vec::new()), Duration::ZERO)
    }

    fn two_seconds() -> Vec<u8> {
        wav_fixture(16_000, 1, 2.0)
    }

    fn errors(service: &AudioWorkService) -> mpsc::UnboundedReceiver<PipelineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        service.on_error(move |e| {
            let _ = tx.send(e);
        });
        rx
    }

    fn encoded(service: &AudioWorkService) -> oneshot::Receiver<EncodedResult> {
        let (tx, rx) = oneshot::channel();
        service.on_encoded(move |result| {
            let _ = tx.send(result);
        });
        rx
    }

    async fn wait_for_state(service: &AudioWorkService, want: PipelineState) {
        tokio::time::timeout(WAIT, async {
            while service.state() != want {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("state never became {want:?}, is {:?}", service.state()));
    }

    async fn next_error(rx: &mut mpsc::UnboundedReceiver<PipelineError>) -> PipelineError {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("error in time")
            .expect("error channel open")
    }

    fn wav_len(result: &EncodedResult) -> usize {
        hound::WavReader::new(Cursor::new(result.bytes().to_vec()))
            .unwrap()
            .len() as usize
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn zero_sample_rate_is_rejected_at_construction() {
        let err = AudioWorkService::new(PipelineConfig::new(0, false)).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)), "got {err:?}");
    }

    #[test]
    fn construction_outside_runtime_fails() {
        let err = AudioWorkService::new(PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoRuntime(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn new_service_is_idle() {
        let service = AudioWorkService::new(PipelineConfig::default()).unwrap();
        assert_eq!(service.state(), PipelineState::Idle);
        assert_eq!(service.mime_type(), "audio/wav");
        assert!(service.decoded().is_none());
    }

    #[tokio::test]
    async fn from_app_config_rejects_bad_bit_depth() {
        let mut config = AppConfig::default();
        config.encoder.bits_per_sample = 8;
        let err = AudioWorkService::from_app_config(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)), "got {err:?}");
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn one_second_from_two_second_buffer() {
        let (service, calls) = service();
        let fired = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        let counter = Arc::clone(&fired);
        service.on_encoded(move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        });

        service.load_from_buffer(two_seconds()).extract(0.0, 1.0);

        let result = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(result.mime_type, "audio/wav");
        assert!(result.size > 0);
        assert_eq!(result.size, result.payload.len());
        assert_eq!(wav_len(&result), 16_000);

        wait_for_state(&service, PipelineState::Completed).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.decoded().map(|d| d.len()), Some(32_000));
    }

    #[tokio::test]
    async fn decoded_event_precedes_encoded_event() {
        let (service, _) = service();
        let rx = encoded(&service);
        let order = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Decoded, EventKind::Encoded] {
            let order = Arc::clone(&order);
            service.events().subscribe(kind, move |event| {
                order.lock().unwrap().push(event.kind());
            });
        }

        // Registered before the load: served once decode completes.
        service.extract(0.5, 1.5);
        assert_eq!(service.state(), PipelineState::ExtractionPending);
        service.load_from_buffer(two_seconds());

        let result = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(wav_len(&result), 16_000);
        assert_eq!(
            *order.lock().unwrap(),
            vec![EventKind::Decoded, EventKind::Encoded]
        );
    }

    #[tokio::test]
    async fn later_pending_extraction_replaces_earlier() {
        let (service, calls) = service();
        let rx = encoded(&service);

        service.extract(0.0, 1.0).extract(0.0, 0.5);
        service.load_from_buffer(two_seconds());

        let result = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(wav_len(&result), 8_000);
        wait_for_state(&service, PipelineState::Completed).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_registration_replaces_first() {
        let (service, _) = service();
        let first = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&first);
        service.on_encoded(move |_| flag.store(true, Ordering::SeqCst));
        let rx = encoded(&service);

        service.load_from_buffer(two_seconds()).extract(0.0, 1.0);

        tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(!first.load(Ordering::SeqCst));
        assert_eq!(service.events().listener_count(EventKind::Encoded), 0);
    }

    #[tokio::test]
    async fn callback_must_be_registered_per_cycle() {
        let (service, calls) = service();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        service.on_encoded(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        service.load_from_buffer(two_seconds()).extract(0.0, 1.0);
        wait_for_state(&service, PipelineState::Completed).await;

        service.extract(1.0, 2.0);
        tokio::time::timeout(WAIT, async {
            while calls.load(Ordering::SeqCst) < 2 || service.state() != PipelineState::Completed {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn completed_service_runs_next_cycle_without_reload() {
        let (service, calls) = service();
        let first = encoded(&service);
        service.load_from_buffer(two_seconds()).extract(0.0, 1.0);
        tokio::time::timeout(WAIT, first).await.unwrap().unwrap();
        wait_for_state(&service, PipelineState::Completed).await;
        assert!(!service.state().is_busy());

        let second = encoded(&service);
        service.extract(1.0, 1.5);
        assert_eq!(service.state(), PipelineState::Encoding);

        let result = tokio::time::timeout(WAIT, second).await.unwrap().unwrap();
        assert_eq!(wav_len(&result), 8_000);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn load_from_url_decodes_fetched_bytes() {
        let (service, _) = service_with(MockTransport::ok(two_seconds()), Duration::ZERO);
        let rx = encoded(&service);

        service
            .load_from_url("http://example.invalid/clip.wav")
            .extract(1.0, 2.0);

        let result = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(wav_len(&result), 16_000);
        assert_eq!(service.raw_len(), Some(two_seconds().len()));
    }

    #[tokio::test]
    async fn newest_load_wins() {
        let (service, _) = service();

        service
            .load_from_buffer(two_seconds())
            .load_from_buffer(wav_fixture(16_000, 1, 1.0));

        wait_for_state(&service, PipelineState::Decoded).await;
        // Give the superseded decode time to finish and be discarded.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(service.decoded().map(|d| d.len()), Some(16_000));
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reversed_range_requests_no_encode() {
        let (service, calls) = service();
        let mut errs = errors(&service);
        let mut rx = encoded(&service);

        service.load_from_buffer(two_seconds());
        wait_for_state(&service, PipelineState::Decoded).await;
        service.extract(1.0, 1.0);

        let err = next_error(&mut errs).await;
        assert!(
            matches!(err, PipelineError::Extract(ExtractError::InvalidRange { .. })),
            "got {err:?}"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn out_of_bounds_range_requests_no_encode() {
        let (service, calls) = service();
        let mut errs = errors(&service);
        let mut rx = encoded(&service);

        service.load_from_buffer(two_seconds()).extract(1.0, 3.0);

        let err = next_error(&mut errs).await;
        assert!(
            matches!(
                err,
                PipelineError::Extract(ExtractError::RangeOutOfBounds { length: 32_000, .. })
            ),
            "got {err:?}"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(service.state(), PipelineState::Decoded);
    }

    #[tokio::test]
    async fn corrupt_bytes_report_decode_error() {
        let (service, _) = service();
        let mut errs = errors(&service);

        service.load_from_buffer(vec![0x42_u8; 256]);

        let err = next_error(&mut errs).await;
        assert!(matches!(err, PipelineError::Decode(_)), "got {err:?}");
        wait_for_state(&service, PipelineState::Failed).await;
        assert!(service.decoded().is_none());
    }

    #[tokio::test]
    async fn failed_fetch_reports_and_skips_decode() {
        let (service, calls) = service_with(MockTransport::err(LoadError::Status(404)), Duration::ZERO);
        let mut errs = errors(&service);

        service.load_from_url("http://example.invalid/missing.wav").extract(0.0, 1.0);

        let err = next_error(&mut errs).await;
        assert_eq!(err, PipelineError::Load(LoadError::Status(404)));
        wait_for_state(&service, PipelineState::Failed).await;
        assert!(service.raw_len().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_url_load_is_rejected() {
        let (service, _) =
            service_with(MockTransport::slow(two_seconds(), Duration::from_millis(200)), Duration::ZERO);
        let mut errs = errors(&service);
        let rx = encoded(&service);

        service
            .load_from_url("http://example.invalid/a.wav")
            .load_from_url("http://example.invalid/b.wav")
            .load_from_buffer(two_seconds());

        assert_eq!(next_error(&mut errs).await, PipelineError::Load(LoadError::Busy));
        assert_eq!(next_error(&mut errs).await, PipelineError::Load(LoadError::Busy));

        // The first retrieval is unaffected.
        service.extract(0.0, 1.0);
        let result = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(wav_len(&result), 16_000);
    }

    #[tokio::test]
    async fn extraction_during_encode_is_busy() {
        let (service, calls) = service_with(MockTransport::ok(Vec::new()), Duration::from_millis(300));
        let mut errs = errors(&service);

        service.load_from_buffer(two_seconds());
        wait_for_state(&service, PipelineState::Decoded).await;

        service.extract(0.0, 1.0).extract(0.0, 0.5);

        assert_eq!(next_error(&mut errs).await, PipelineError::EncoderBusy);
        wait_for_state(&service, PipelineState::Completed).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn destroy_mid_encode_suppresses_completion() {
        let (service, calls) = service_with(MockTransport::ok(Vec::new()), Duration::from_millis(300));
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        service.on_encoded(move |_| flag.store(true, Ordering::SeqCst));

        service.load_from_buffer(two_seconds()).extract(0.0, 1.0);
        wait_for_state(&service, PipelineState::Encoding).await;
        service.destroy();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.state(), PipelineState::Closed);
    }

    #[tokio::test]
    async fn destroyed_service_is_inert() {
        let (service, calls) = service();
        service.destroy();
        service.destroy();

        let errs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errs);
        service
            .on_error(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .load_from_buffer(two_seconds())
            .extract(2.0, 1.0)
            .extract(0.0, 1.0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(service.state(), PipelineState::Closed);
        assert_eq!(errs.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(service.raw_len().is_none());
        assert_eq!(service.events().listener_count(EventKind::Error), 0);
    }

    #[tokio::test]
    async fn destroy_during_decode_discards_result() {
        let (service, _) = service();
        let decoded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&decoded);
        service.events().subscribe(EventKind::Decoded, move |_| {
            flag.store(true, Ordering::SeqCst);
        });

        service.load_from_buffer(two_seconds());
        service.destroy();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!decoded.load(Ordering::SeqCst));
        assert!(service.decoded().is_none());
    }
}
