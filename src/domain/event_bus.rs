//! Fan-out of [`LiveEvent`]s to live subscribers.
//!
//! [`EventBus`] keeps a registry of bounded per-subscriber channels. A
//! publish encodes the event once and offers it to every channel with
//! `try_send`, so a slow or dead subscriber never stalls the publisher. A
//! subscriber whose buffer is full or whose receiver is gone is removed from
//! the registry; dropping its sender ends the subscription.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use super::LiveEvent;

/// Default per-subscriber buffer, in messages.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

type Frame = Arc<str>;

#[derive(Debug)]
struct Registry {
    subscribers: RwLock<HashMap<Uuid, mpsc::Sender<Frame>>>,
    buffer: usize,
}

impl Registry {
    fn remove(&self, id: &Uuid) -> bool {
        self.subscribers.write().remove(id).is_some()
    }
}

/// Process-wide broadcaster of live events.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    /// Creates a bus whose subscribers each buffer up to `buffer` undelivered
    /// messages before being disconnected.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: RwLock::new(HashMap::new()),
                // Room for the connected acknowledgment plus one event.
                buffer: buffer.max(2),
            }),
        }
    }

    /// Registers a new subscriber. Its first message is a `connected`
    /// acknowledgment; afterwards it receives every event published while it
    /// stays registered.
    #[must_use]
    pub fn subscribe(&self) -> Subscriber {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.registry.buffer);

        if let Some(ack) = encode(&LiveEvent::Connected { subscriber_id: id }) {
            // Fresh channel with capacity >= 2: cannot be full.
            let _ = sender.try_send(ack);
        }
        self.registry.subscribers.write().insert(id, sender);
        tracing::debug!(subscriber = %id, "live subscriber registered");

        Subscriber {
            id,
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Unregisters a subscriber explicitly. Dropping it has the same effect.
    pub fn unsubscribe(&self, subscriber: Subscriber) {
        drop(subscriber);
    }

    /// Offers `event` to every registered subscriber without waiting on any
    /// of them.
    ///
    /// Returns the number of subscribers the event was queued for.
    /// Subscribers that could not accept it are removed.
    pub fn publish(&self, event: &LiveEvent) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let subscribers = self.registry.subscribers.read();
            for (id, sender) in subscribers.iter() {
                match sender.try_send(Arc::clone(&frame)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(subscriber = %id, "live subscriber lagging; disconnecting");
                        dead.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.registry.subscribers.write();
            for id in &dead {
                subscribers.remove(id);
            }
        }

        tracing::debug!(
            event = event.event_type_str(),
            delivered,
            pruned = dead.len(),
            "live event published"
        );
        delivered
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// One live subscription. Unregisters itself when dropped.
#[derive(Debug)]
pub struct Subscriber {
    id: Uuid,
    receiver: mpsc::Receiver<Frame>,
    registry: Arc<Registry>,
}

impl Subscriber {
    /// Subscription identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next encoded message. Returns `None` once the bus has
    /// dropped this subscriber and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Returns the next buffered message without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            tracing::debug!(subscriber = %self.id, "live subscriber unregistered");
        }
    }
}

fn encode(event: &LiveEvent) -> Option<Frame> {
    match serde_json::to_string(&event.frame()) {
        Ok(json) => Some(Arc::from(json)),
        Err(err) => {
            tracing::error!(error = %err, event = event.event_type_str(), "failed to encode live event");
            None
        }
    }
}
