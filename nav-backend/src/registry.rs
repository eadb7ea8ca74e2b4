//! Connected-clients registry for best-effort broadcast.
//!
//! Mutated on connect/disconnect under a single exclusive section;
//! broadcast takes a snapshot and drops failed sends without tearing down
//! the registry itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

pub type ClientId = u64;

pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: RwLock<HashMap<ClientId, mpsc::UnboundedSender<Value>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), clients: RwLock::new(HashMap::new()) }
    }

    pub async fn join(&self, sender: mpsc::UnboundedSender<Value>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.write().await.insert(id, sender);
        id
    }

    pub async fn leave(&self, id: ClientId) {
        self.clients.write().await.remove(&id);
    }

    /// Sends `message` to every connected client. A send failure (closed
    /// channel) is logged and the client is left for its own disconnect
    /// handler to remove — broadcast never tears down the registry.
    pub async fn broadcast(&self, message: Value) {
        let snapshot: Vec<(ClientId, mpsc::UnboundedSender<Value>)> =
            self.clients.read().await.iter().map(|(id, tx)| (*id, tx.clone())).collect();
        for (id, tx) in snapshot {
            if tx.send(message.clone()).is_err() {
                debug!("registry: dropped broadcast to disconnected client {id}");
            }
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedRegistry = Arc<ClientRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_joined_clients() {
        let registry = ClientRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.join(tx1).await;
        registry.join(tx2).await;

        registry.broadcast(serde_json::json!({"kind": "ping"})).await;

        assert_eq!(rx1.recv().await.unwrap()["kind"], "ping");
        assert_eq!(rx2.recv().await.unwrap()["kind"], "ping");
    }

    #[tokio::test]
    async fn leave_removes_client_from_future_broadcasts() {
        let registry = ClientRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.join(tx).await;
        registry.leave(id).await;
        drop(rx);

        registry.broadcast(serde_json::json!({"kind": "ping"})).await;
    }
}
