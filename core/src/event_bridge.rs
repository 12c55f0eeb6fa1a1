//! Single-subscriber outbound event stream.
//!
//! The [`EventBridge`] is the one exit point for domain events. It delivers
//! events to exactly one active subscriber in the order they are emitted.
//!
//! # Delivery Model
//!
//! ```text
//! ┌─────────────┐   emit()   ┌──────────────┐   stream   ┌────────────┐
//! │   Reducer   │──────────▶│ EventBridge  │──────────▶│ Subscriber │
//! └─────────────┘            │ (one slot)   │            └────────────┘
//!                            └──────────────┘
//! ```
//!
//! - **One slot**: `subscribe()` replaces the previous subscriber; the old
//!   subscription's stream ends.
//! - **Fire-and-forget**: with no subscriber, emitted events are discarded.
//!   There is no buffering and no backpressure.
//! - **Ordered**: events reach the subscriber in emission order. Emitting from
//!   inside a serialized reducer therefore preserves causal order.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//!
//! let bridge = EventBridge::new();
//! let mut events = bridge.subscribe();
//! bridge.emit(MyEvent::Started);
//! assert_eq!(events.next().await, Some(MyEvent::Started));
//! ```

use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// The currently installed subscriber
struct Slot<E> {
    id: u64,
    sender: mpsc::UnboundedSender<E>,
}

/// Outbound event stream with a single active subscriber.
///
/// Cloning is cheap; all clones share the same subscriber slot.
pub struct EventBridge<E> {
    slot: Arc<Mutex<Option<Slot<E>>>>,
    next_id: Arc<AtomicU64>,
}

impl<E> EventBridge<E> {
    /// Create a bridge with no subscriber
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Install a new subscriber, replacing any previous one.
    ///
    /// The previous subscription stops receiving events and its stream
    /// terminates once drained.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription<E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.replace(Slot { id, sender }).is_some() {
            tracing::debug!(subscription = id, "Replaced previous event subscriber");
        } else {
            tracing::debug!(subscription = id, "Event subscriber attached");
        }

        EventSubscription { id, receiver }
    }

    /// Deliver an event to the active subscriber.
    ///
    /// Returns `true` if the event was handed to a live subscriber, `false` if
    /// it was discarded (no subscriber, or the subscriber went away).
    pub fn emit(&self, event: E) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(active) = slot.as_ref() else {
            tracing::trace!("No event subscriber, discarding event");
            return false;
        };

        if active.sender.send(event).is_ok() {
            return true;
        }

        tracing::debug!(subscription = active.id, "Event subscriber dropped, clearing slot");
        *slot = None;
        false
    }

    /// Whether a subscriber is currently installed
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| !active.sender.is_closed())
    }

    /// Detach the current subscriber, if any
    pub fn unsubscribe(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl<E> Default for EventBridge<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventBridge<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<E> std::fmt::Debug for EventBridge<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("has_subscriber", &self.has_subscriber())
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`EventBridge::subscribe`].
///
/// Implements [`Stream`]; the stream ends when a newer subscriber replaces
/// this one (after already-delivered events are drained).
#[derive(Debug)]
pub struct EventSubscription<E> {
    id: u64,
    receiver: mpsc::UnboundedReceiver<E>,
}

impl<E> EventSubscription<E> {
    /// Identifier of this subscription
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Take the next already-delivered event without waiting
    pub fn try_next(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    /// Drain every already-delivered event without waiting
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }
}

impl<E> Stream for EventSubscription<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.receiver.poll_recv(cx)
    }
}
