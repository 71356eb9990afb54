//! Event bus for discovery events

use std::sync::{Arc, Mutex, PoisonError};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::DiscoveryError;
use crate::types::DiscoveryRecord;

/// Discovery events
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A player answered a search request
    Found(DiscoveryRecord),
    /// The session faulted or was stopped
    Error(DiscoveryError),
}

impl DiscoveryEvent {
    /// The kind of this event
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Found(_) => EventKind::Found,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Event names subscribers can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `found` events
    Found,
    /// `error` events
    Error,
}

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<DiscoveryEvent>,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Event bus for distributing discovery events
///
/// Every subscriber owns an unbounded queue, so events are delivered in
/// publish order and never dropped by the bus. Publishing and
/// (un)subscribing are serialized by one lock, which makes it safe for a
/// subscriber to unsubscribe itself or others while events are in flight.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the given event kinds
    #[must_use]
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.lock();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.subscribers.push(Subscriber {
            id,
            kinds: kinds.to_vec(),
            tx,
        });

        Subscription {
            id,
            rx,
            bus: self.clone(),
            active: true,
        }
    }

    /// Subscribe to both `found` and `error` events
    #[must_use]
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(&[EventKind::Found, EventKind::Error])
    }

    /// Publish an event to every current subscriber of its kind
    ///
    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, event: &DiscoveryEvent) -> usize {
        let kind = event.kind();
        let mut registry = self.lock();

        // Receivers dropped without unsubscribing
        registry.subscribers.retain(|s| !s.tx.is_closed());

        registry
            .subscribers
            .iter()
            .filter(|s| s.kinds.contains(&kind))
            .filter(|s| s.tx.send(event.clone()).is_ok())
            .count()
    }

    /// Remove a subscription
    ///
    /// Returns `false` if the subscription was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|s| s.id != id);
        registry.subscribers.len() != before
    }

    /// Get the number of live subscribers for an event kind
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.kinds.contains(&kind) && !s.tx.is_closed())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live subscription on an [`EventBus`]
///
/// The subscription is removed from the bus exactly once: either by
/// [`Subscription::unsubscribe`] or when it is dropped.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<DiscoveryEvent>,
    bus: EventBus,
    active: bool,
}

impl Subscription {
    /// The handle of this subscription
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next event
    ///
    /// Returns `None` once the subscription has been removed and every
    /// queued event has been drained.
    pub async fn recv(&mut self) -> Option<DiscoveryEvent> {
        self.rx.recv().await
    }

    /// Receive a queued event without waiting
    pub fn try_recv(&mut self) -> Option<DiscoveryEvent> {
        self.rx.try_recv().ok()
    }

    /// Remove the subscription from the bus
    ///
    /// Returns `false` if it had already been removed through its id.
    pub fn unsubscribe(mut self) -> bool {
        self.detach()
    }

    /// Turn the subscription into a stream of events
    pub fn into_stream(self) -> impl Stream<Item = DiscoveryEvent> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }

    fn detach(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.bus.unsubscribe(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
