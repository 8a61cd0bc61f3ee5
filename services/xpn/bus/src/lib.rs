//! Process-wide typed publish/subscribe bus.
//!
//! The bus is the sole coupling mechanism between the transport, the
//! session controller, the command encoder and the rest of the process;
//! no component holds a direct reference to another. Topics and payloads
//! are closed enums, so a publish/subscribe pair that disagrees about its
//! payload fails to compile instead of failing at runtime.
//!
//! Dispatch is synchronous on the publishing thread, in subscription
//! order. There is no internal queue.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event;
pub mod topic;

pub use event::Event;
pub use topic::Topic;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

type Handler = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Identifies one subscription on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Entry {
    id: u64,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    topics: Mutex<HashMap<Topic, Vec<Entry>>>,
    next_id: AtomicU64,
}

/// The event bus. Cheap to clone; all clones share the same topic table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to every handler subscribed to `topic`.
    ///
    /// Handlers run synchronously in subscription order. One-shot handlers
    /// are removed before they run, so a reentrant publish of the same
    /// topic cannot fire them twice. Handlers registered during dispatch
    /// do not see the in-flight event.
    pub fn publish(&self, topic: Topic, event: Event) {
        let handlers: Vec<Handler> = {
            let mut topics = self.inner.topics.lock().expect("bus lock");
            match topics.get_mut(&topic) {
                None => return,
                Some(entries) => {
                    let handlers = entries.iter().map(|e| e.handler.clone()).collect();
                    entries.retain(|e| !e.once);
                    if entries.is_empty() {
                        topics.remove(&topic);
                    }
                    handlers
                }
            }
        };

        trace!(?topic, handlers = handlers.len(), "bus publish");
        for handler in handlers {
            handler(&event);
        }
    }

    /// Subscribe a handler that fires on every publish of `topic`
    pub fn subscribe_always<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(topic, handler, false)
    }

    /// Subscribe a handler that fires on the next publish of `topic` and
    /// then removes itself
    pub fn subscribe_once<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(topic, handler, true)
    }

    fn subscribe<F>(&self, topic: Topic, handler: F, once: bool) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.inner.topics.lock().expect("bus lock");
        topics.entry(topic).or_default().push(Entry {
            id,
            once,
            handler: Arc::new(handler),
        });
        SubscriptionId(id)
    }

    /// Remove every handler subscribed to `topic`. Unsubscribing a topic
    /// with no handlers is a no-op.
    pub fn unsubscribe_all(&self, topic: &Topic) {
        let mut topics = self.inner.topics.lock().expect("bus lock");
        topics.remove(topic);
    }

    /// Remove one subscription by id. Removing an already-gone
    /// subscription is a no-op.
    pub fn unsubscribe(&self, topic: &Topic, subscription: SubscriptionId) {
        let mut topics = self.inner.topics.lock().expect("bus lock");
        if let Some(entries) = topics.get_mut(topic) {
            entries.retain(|e| e.id != subscription.0);
            if entries.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Number of live subscriptions on `topic`
    pub fn handler_count(&self, topic: &Topic) -> usize {
        let topics = self.inner.topics.lock().expect("bus lock");
        topics.get(topic).map_or(0, Vec::len)
    }
}
