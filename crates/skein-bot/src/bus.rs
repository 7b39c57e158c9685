//! In-process event bus.
//!
//! The bus keeps a listener table mapping each [`EventKind`] to an ordered
//! list of callbacks. Multiple registrations per kind are permitted and not
//! de-duplicated; within a kind, callbacks run in registration order.
//!
//! Alongside the callback table the bus mirrors every emission into a
//! broadcast channel, so consumers can also take events as an async stream
//! ([`EventBus::subscribe`] / [`EventBus::event_stream`]). The tap is a
//! read-only side channel: subscribing to it does not start any driver.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::broadcast;

use crate::events::{BotEvent, EventKind};
use crate::stream::broadcast_to_stream;

/// Handle for removing a registered listener.
pub type ListenerId = u64;

type Handler = Arc<dyn Fn(BotEvent) + Send + Sync + 'static>;

/// Typed publish/subscribe surface exposed to application code.
pub struct EventBus {
    /// Listener table: kind -> ordered list of callbacks.
    listeners: DashMap<EventKind, Vec<(ListenerId, Handler)>>,
    /// Next listener id.
    next_id: AtomicU64,
    /// Broadcast mirror of every emitted event.
    tap: broadcast::Sender<BotEvent>,
}

impl EventBus {
    /// Create a bus whose broadcast tap buffers up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tap, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            tap,
        }
    }

    /// Register a callback for an event kind. Returns an id usable
    /// with [`EventBus::off`].
    pub fn on<F>(&self, kind: EventKind, f: F) -> ListenerId
    where
        F: Fn(BotEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(f)));
        id
    }

    /// Remove a previously registered callback. Returns whether it existed.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        match self.listeners.get_mut(&kind) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|(lid, _)| *lid != id);
                entry.len() != before
            }
            None => false,
        }
    }

    /// Clear listeners for one kind, or all listeners when `kind` is `None`.
    pub fn clear(&self, kind: Option<EventKind>) {
        match kind {
            Some(kind) => {
                self.listeners.remove(&kind);
            }
            None => self.listeners.clear(),
        }
    }

    /// Whether any callback is registered for `kind`.
    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listeners
            .get(&kind)
            .map(|entry| !entry.is_empty())
            .unwrap_or(false)
    }

    /// Number of callbacks registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(|e| e.len()).unwrap_or(0)
    }

    /// The set of kinds that currently have at least one callback.
    ///
    /// Drivers snapshot this per unit of work to let the classifier skip
    /// kinds nobody is listening for.
    pub fn listened_kinds(&self) -> HashSet<EventKind> {
        self.listeners
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect()
    }

    /// Deliver an event to every callback registered for its kind, in
    /// registration order, then mirror it into the broadcast tap.
    pub fn emit(&self, event: BotEvent) {
        let kind = event.kind();

        // Snapshot handlers so a callback may register/remove listeners
        // without deadlocking the table.
        let handlers: Vec<Handler> = self
            .listeners
            .get(&kind)
            .map(|entry| entry.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if handlers.is_empty() && kind == EventKind::Error {
            // Without an `error` listener a failure would vanish entirely.
            tracing::warn!(event = %kind, "error event emitted with no error listener: {:?}", event);
        }

        for handler in handlers {
            handler(event.clone());
        }

        // Receiver count may be zero; that is not a failure.
        let _ = self.tap.send(event);
    }

    /// Subscribe to the broadcast tap.
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tap.subscribe()
    }

    /// The broadcast tap as an async stream.
    pub fn event_stream(&self) -> Pin<Box<dyn Stream<Item = BotEvent> + Send>> {
        broadcast_to_stream(self.tap.subscribe())
    }
}
