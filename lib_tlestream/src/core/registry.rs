//! # Subscriber Registry
//!
//! The live set of connected subscribers and the fan-out of [`ChangeEvent`]s to
//! them.
//!
//! ## Core Design Principles:
//!
//! 1.  **Owned Membership**: the subscriber list is private. It changes only
//!     through [`SubscriberRegistry::join`], [`SubscriberRegistry::leave`] and
//!     the removals [`SubscriberRegistry::broadcast`] performs itself.
//!
//! 2.  **Zero-Copy Fan-out**: an event is wrapped in a single `Arc`; every
//!     subscriber receives a pointer to the same allocation.
//!
//! 3.  **Non-blocking Sends**: each subscriber owns a bounded channel and the
//!     broadcast uses `try_send`. A closed receiver means the consumer is gone;
//!     a full buffer means it stopped draining. Either way that one subscriber
//!     is dropped and the others are unaffected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::core::event::ChangeEvent;

/// Identifier assigned to a subscriber on join.
pub type SubscriberId = u64;

/// The registry-side half of one subscriber.
struct SubscriberHandle {
    id: SubscriberId,
    sender: mpsc::Sender<Arc<ChangeEvent>>,
}

/// # Subscription
///
/// The consumer-side half returned by [`SubscriberRegistry::join`]. Dropping
/// it is enough for the registry to forget the subscriber on the next
/// broadcast; transports that learn about a close earlier call
/// [`SubscriberRegistry::leave`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<ChangeEvent>>,
}

impl Subscription {
    /// The id this subscription was registered under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event; `None` once the registry has dropped us.
    pub async fn recv(&mut self) -> Option<Arc<ChangeEvent>> {
        self.receiver.recv().await
    }

    /// Takes an already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ChangeEvent>> {
        self.receiver.try_recv().ok()
    }
}

/// # Subscriber Registry
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<SubscriberHandle>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl SubscriberRegistry {
    /// Creates an empty registry whose subscribers each buffer up to `buffer`
    /// undelivered events.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Adds a new subscriber to the live set.
    pub fn join(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SubscriberHandle { id, sender });
        log::info!("Subscriber {} joined", id);

        Subscription { id, receiver }
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn leave(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        if removed {
            log::info!("Subscriber {} left", id);
        }
        removed
    }

    /// Delivers `event` to every current subscriber.
    ///
    /// Subscribers whose send fails are removed. Returns how many received it.
    pub fn broadcast(&self, event: ChangeEvent) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0;

        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| match subscriber.sender.try_send(Arc::clone(&event)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!(
                    "Subscriber {} is not draining its queue. Dropping it.",
                    subscriber.id
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::info!("Subscriber {} disconnected. Removing it.", subscriber.id);
                false
            }
        });

        delivered
    }

    /// Number of subscribers currently in the live set.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if `id` is still in the live set.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|s| s.id == id)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}
