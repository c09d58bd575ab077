//! Typed publish/subscribe channel that sequences the pipeline's
//! asynchronous stages.
//!
//! # Design
//!
//! Listeners are keyed by [`EventKind`].  [`EventChannel::publish`] copies
//! the current listeners for one kind out of the registry, releases the
//! lock, and only then invokes them, so a listener may call back into the
//! channel (or into the service that owns it) without deadlocking.  Each
//! listener sits behind its own mutex: concurrent publishes of the same kind
//! are delivered one after the other, never dropped.  A listener that
//! publishes its own kind from inside itself gets that event queued and
//! delivered as soon as the current call returns.  One-shot listeners leave
//! the registry when a publish picks them up.
//!
//! ```text
//! decode task ──publish(Decoded)──▶ EventChannel ──▶ pending extraction
//! encoder pump ─publish(Encoded)──▶ EventChannel ──▶ on_encoded callback (once)
//! any stage ────publish(Error)────▶ EventChannel ──▶ on_error callback
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::audio::DecodedAudio;
use crate::pipeline::{EncodedResult, PipelineError};

// ---------------------------------------------------------------------------
// EventKind / PipelineEvent
// ---------------------------------------------------------------------------

/// Names of the channels listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Decoded,
    Encoded,
    Error,
}

/// An event together with its payload.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A load finished decoding.
    Decoded(Arc<DecodedAudio>),
    /// An extraction finished encoding.
    Encoded(EncodedResult),
    /// A stage failed.
    Error(PipelineError),
}

impl PipelineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PipelineEvent::Decoded(_) => EventKind::Decoded,
            PipelineEvent::Encoded(_) => EventKind::Encoded,
            PipelineEvent::Error(_) => EventKind::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Token returned by the subscribe calls; pass it to
/// [`EventChannel::unsubscribe`] to remove a single listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&PipelineEvent) + Send>;

/// One registered listener plus its re-entrancy bookkeeping.
struct Slot {
    listener: Mutex<Listener>,
    dispatch: Mutex<Dispatch>,
}

/// Thread currently running the listener and events it published to
/// itself in the meantime.
#[derive(Default)]
struct Dispatch {
    owner: Option<ThreadId>,
    deferred: VecDeque<PipelineEvent>,
}

impl Slot {
    fn new(listener: Listener) -> Self {
        Self {
            listener: Mutex::new(listener),
            dispatch: Mutex::new(Dispatch::default()),
        }
    }

    fn dispatch(&self) -> MutexGuard<'_, Dispatch> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invoke the listener with `event`, waiting for any other thread that
    /// is running it.
    fn deliver(&self, event: &PipelineEvent) {
        let me = thread::current().id();
        {
            let mut dispatch = self.dispatch();
            if dispatch.owner == Some(me) {
                dispatch.deferred.push_back(event.clone());
                return;
            }
        }

        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        self.dispatch().owner = Some(me);
        (*listener)(event);

        loop {
            let next = {
                let mut dispatch = self.dispatch();
                match dispatch.deferred.pop_front() {
                    Some(next) => next,
                    None => {
                        dispatch.owner = None;
                        break;
                    }
                }
            };
            (*listener)(&next);
        }
    }
}

struct Registration {
    id: ListenerId,
    once: bool,
    slot: Arc<Slot>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<Registration>>,
}

// ---------------------------------------------------------------------------
// EventChannel
// ---------------------------------------------------------------------------

/// Thread-safe event bus.  Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct EventChannel {
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        let counts: HashMap<EventKind, usize> = registry
            .listeners
            .iter()
            .map(|(kind, regs)| (*kind, regs.len()))
            .collect();
        f.debug_struct("EventChannel")
            .field("listeners", &counts)
            .finish()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, kind: EventKind, once: bool, listener: Listener) -> ListenerId {
        let mut registry = self.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.entry(kind).or_default().push(Registration {
            id,
            once,
            slot: Arc::new(Slot::new(listener)),
        });
        id
    }

    /// Register a listener that fires on every `kind` event.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&PipelineEvent) + Send + 'static,
    {
        self.register(kind, false, Box::new(listener))
    }

    /// Register a listener that is removed after its first delivery.
    pub fn subscribe_once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&PipelineEvent) + Send + 'static,
    {
        self.register(kind, true, Box::new(listener))
    }

    /// Remove one listener.  Returns `false` when it was not registered
    /// (already fired or removed).
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        for regs in registry.listeners.values_mut() {
            if let Some(pos) = regs.iter().position(|r| r.id == id) {
                regs.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove every listener for `kind`.  A publish already in progress
    /// still finishes delivering to the listeners it picked up.
    pub fn remove_all(&self, kind: EventKind) {
        self.lock().listeners.remove(&kind);
    }

    /// Remove every listener of every kind.
    pub fn clear(&self) {
        self.lock().listeners.clear();
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its kind, in registration order.
    /// Returns the number of listeners invoked.
    pub fn publish(&self, event: &PipelineEvent) -> usize {
        let kind = event.kind();

        let slots: Vec<Arc<Slot>> = {
            let mut registry = self.lock();
            let Some(regs) = registry.listeners.get_mut(&kind) else {
                return 0;
            };
            let slots = regs.iter().map(|r| Arc::clone(&r.slot)).collect();
            regs.retain(|r| !r.once);
            slots
        };

        for slot in &slots {
            slot.deliver(event);
        }
        slots.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
