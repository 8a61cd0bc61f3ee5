//! Correlation of outbound requests with their replies.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;
use xpn_wire::{CorrelationId, Reply};

/// In-flight requests keyed by correlation id.
///
/// A request registers a oneshot sender under its id; the reply path
/// resolves it when an envelope carrying that id arrives. Entries have
/// no deadline: a reply the engine never sends leaves the waiter
/// pending until its receiver is dropped.
#[derive(Default)]
pub struct PendingRequests {
    waiting: Mutex<HashMap<CorrelationId, oneshot::Sender<Reply>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`, returning the receiving half
    pub fn register(&self, id: CorrelationId) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.waiting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, tx);
        rx
    }

    /// Deliver a reply to its waiter, if one is still registered.
    /// Returns false for unknown or already-resolved ids.
    pub fn resolve(&self, id: &CorrelationId, reply: Reply) -> bool {
        let sender = self
            .waiting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
        match sender {
            Some(tx) => tx.send(reply).is_ok(),
            None => {
                debug!(%id, "reply with no matching request");
                false
            }
        }
    }

    /// Number of requests still awaiting a reply
    pub fn len(&self) -> usize {
        self.waiting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply_for(id: &CorrelationId) -> Reply {
        Reply {
            uuid: Some(id.clone()),
            take_id: None,
            name: None,
            action: "GetTakeItemStatus".to_string(),
            response: json!(true),
        }
    }

    #[tokio::test]
    async fn test_register_then_resolve() {
        let pending = PendingRequests::new();
        let id = CorrelationId::generate();
        let rx = pending.register(id.clone());

        assert!(pending.resolve(&id, reply_for(&id)));
        let reply = rx.await.unwrap();
        assert_eq!(reply.uuid, Some(id));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_reported() {
        let pending = PendingRequests::new();
        let id = CorrelationId::generate();
        assert!(!pending.resolve(&id, reply_for(&id)));
    }

    #[tokio::test]
    async fn test_resolve_is_one_shot() {
        let pending = PendingRequests::new();
        let id = CorrelationId::generate();
        let _rx = pending.register(id.clone());

        assert!(pending.resolve(&id, reply_for(&id)));
        assert!(!pending.resolve(&id, reply_for(&id)));
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let pending = PendingRequests::new();
        let ids: Vec<_> = (0..8).map(|_| CorrelationId::generate()).collect();
        let receivers: Vec<_> = ids.iter().map(|id| pending.register(id.clone())).collect();

        // Resolve in reverse order; each waiter still gets its own id
        for id in ids.iter().rev() {
            assert!(pending.resolve(id, reply_for(id)));
        }
        for (id, rx) in ids.iter().zip(receivers) {
            let reply = rx.await.unwrap();
            assert_eq!(reply.uuid.as_ref(), Some(id));
        }
    }
}
