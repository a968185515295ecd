//! Per-task fan-out of live events.
//!
//! Each subscriber gets its own bounded queue. Publishing never waits: if a
//! subscriber's queue is full that subscriber misses the event and the agent
//! loop carries on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use crate::types::Event;

/// Pending events a subscriber may fall behind by before it starts missing some.
pub const SUBSCRIBER_CAPACITY: usize = 50;

/// Identifies one subscription within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// The receiving end handed to an observer.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub events: mpsc::Receiver<Event>,
}

#[derive(Debug)]
pub struct EventHub {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<String, Vec<(SubscriberId, mpsc::Sender<Event>)>>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(SUBSCRIBER_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new observer. It only sees events published from now on.
    pub fn subscribe(&self, task_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .entry(task_id.to_string())
            .or_default()
            .push((id, tx));
        Subscription { id, events: rx }
    }

    /// Remove an observer. Its receiver drains what is queued, then ends.
    /// Unknown ids are ignored.
    pub fn unsubscribe(&self, task_id: &str, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock();
        if let Some(list) = subscribers.get_mut(task_id) {
            list.retain(|(sub, _)| *sub != id);
            if list.is_empty() {
                subscribers.remove(task_id);
            }
        }
    }

    /// Deliver to every current subscriber without blocking.
    pub fn publish(&self, task_id: &str, event: Event) {
        let subscribers = self.subscribers.lock();
        let Some(list) = subscribers.get(task_id) else {
            return;
        };
        for (id, tx) in list {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(task_id, subscriber = id.0, "dropping event for slow consumer");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Receiver went away without unsubscribing; the transport will clean up.
                }
            }
        }
    }

    pub fn subscriber_count(&self, task_id: &str) -> usize {
        self.subscribers
            .lock()
            .get(task_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
