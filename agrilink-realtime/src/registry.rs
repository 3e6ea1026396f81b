//! Subscriber registry and event dispatch.
//!
//! Callbacks are grouped by [`Topic`]. Dispatching an event runs every
//! callback of the event's own topic, then every wildcard callback, each in
//! registration order. A panicking callback is contained and logged; the
//! rest of the dispatch continues.

use agrilink_core::{EventKind, RealtimeEvent};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::error;

/// What a subscriber listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every event, whatever its kind.
    All,
    Kind(EventKind),
}

impl From<EventKind> for Topic {
    fn from(kind: EventKind) -> Self {
        Topic::Kind(kind)
    }
}

pub type Callback = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    topics: HashMap<Topic, Vec<(u64, Callback)>>,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic, callback: Callback) -> Subscription {
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .topics
            .entry(topic.clone())
            .or_default()
            .push((id, callback));
        Subscription {
            id,
            topic,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove every subscriber.
    pub fn clear(&self) {
        lock(&self.inner).topics.clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).topics.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        lock(&self.inner).topics.get(topic).map_or(0, Vec::len)
    }

    /// Deliver `event` to its topic's subscribers, then to wildcard ones.
    ///
    /// Callbacks run outside the registry lock, so a callback may subscribe
    /// or unsubscribe without deadlocking.
    pub fn dispatch(&self, event: &RealtimeEvent) -> DispatchReport {
        let callbacks: Vec<(u64, Callback)> = {
            let inner = lock(&self.inner);
            let named = inner.topics.get(&Topic::Kind(event.kind()));
            let wildcard = inner.topics.get(&Topic::All);
            named
                .into_iter()
                .chain(wildcard)
                .flatten()
                .cloned()
                .collect()
        };

        let mut report = DispatchReport::default();
        for (id, callback) in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    error!(
                        event = %event.kind(),
                        subscriber = id,
                        "Subscriber panicked, continuing dispatch"
                    );
                }
            }
        }
        report
    }
}

/// Handle returned by `subscribe`; pass it back to stop receiving events.
#[must_use = "dropping a Subscription keeps the callback registered; call unsubscribe() to remove it"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns false when the callback was already gone (for example after
    /// the channel was disconnected).
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut inner = lock(&inner);
        let Some(subscribers) = inner.topics.get_mut(&self.topic) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != self.id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            inner.topics.remove(&self.topic);
        }
        removed
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
