//! Subscriber registry: live fan-out of stream events
//!
//! Each subscriber owns a bounded channel. Publishing never waits: a send
//! into a full buffer disconnects that subscriber instead of stalling the
//! run loop. Slow consumers therefore lose the rest of the feed and observe
//! end-of-stream once they drain what was already buffered.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

use crate::events::StreamEvent;

/// Identity of a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving end handed to a subscriber
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<StreamEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the subscriber has been unregistered and
    /// its buffer is drained.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Next buffered event without waiting
    pub fn try_recv(&mut self) -> Result<StreamEvent, TryRecvError> {
        self.rx.try_recv()
    }

    /// Consume the subscription as a `Stream`
    pub fn into_stream(self) -> ReceiverStream<StreamEvent> {
        ReceiverStream::new(self.rx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Outcome of a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the event
    pub delivered: usize,
    /// Subscribers removed during this publish
    pub dropped: usize,
}

/// Registry of live subscribers
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<StreamEvent>>>,
    buffer: usize,
}

impl SubscriberRegistry {
    /// Create a registry whose subscribers buffer up to `buffer` events
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber. It receives events published from now on.
    ///
    /// Subscribers whose receiver has been dropped are pruned here too, so
    /// departed ones do not pile up while nothing is being published.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId::next();
        let (tx, rx) = mpsc::channel(self.buffer);
        {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|_, sender| !sender.is_closed());
            subscribers.insert(id, tx);
        }
        tracing::debug!("Subscriber {} registered", id);
        Subscription { id, rx }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    ///
    /// Returns whether the subscriber was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscriber {} unregistered", id);
        }
        removed
    }

    /// Number of registered subscribers that are still listening
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .values()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every registered subscriber without waiting.
    ///
    /// Subscribers whose buffer is full or whose receiver is gone are
    /// unregistered.
    pub(crate) fn publish(&self, event: &StreamEvent) -> PublishReport {
        let mut report = PublishReport::default();
        let mut dead = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            "Subscriber {} buffer full ({} events), disconnecting",
                            id,
                            self.buffer
                        );
                        dead.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!("Subscriber {} went away", id);
                        dead.push(*id);
                    }
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &dead {
                if subscribers.remove(id).is_some() {
                    report.dropped += 1;
                }
            }
        }

        report
    }
}
